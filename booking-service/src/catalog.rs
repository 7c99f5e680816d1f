//! Read-only reference data: the tests the lab offers and the doctors who perform them.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use crate::{
    error::BookingError,
    models::{Doctor, MedicalTest},
};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_tests(&self) -> Result<Vec<MedicalTest>, BookingError>;
    async fn get_test(&self, id: &str) -> Result<Option<MedicalTest>, BookingError>;
    async fn get_doctor(&self, id: &str) -> Result<Option<Doctor>, BookingError>;
    /// Doctors whose specialties contain `test_id`.
    async fn doctors_for_test(&self, test_id: &str) -> Result<Vec<Doctor>, BookingError>;
}

pub struct InMemoryCatalog {
    tests: Vec<MedicalTest>,
    doctors: Vec<Doctor>,
}

impl InMemoryCatalog {
    pub fn new(tests: Vec<MedicalTest>, doctors: Vec<Doctor>) -> Self {
        Self { tests, doctors }
    }

    /// The lab's standard catalog.
    pub fn seeded() -> Self {
        Self::new(seed_tests(), seed_doctors())
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_tests(&self) -> Result<Vec<MedicalTest>, BookingError> {
        Ok(self.tests.clone())
    }

    async fn get_test(&self, id: &str) -> Result<Option<MedicalTest>, BookingError> {
        Ok(self.tests.iter().find(|t| t.id == id).cloned())
    }

    async fn get_doctor(&self, id: &str) -> Result<Option<Doctor>, BookingError> {
        Ok(self.doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn doctors_for_test(&self, test_id: &str) -> Result<Vec<Doctor>, BookingError> {
        Ok(self
            .doctors
            .iter()
            .filter(|d| d.performs(test_id))
            .cloned()
            .collect())
    }
}

/// Catalog stored in the `tests` and `doctors` tables.
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables and, when they are empty, loads the standard catalog.
    pub async fn migrate(&self) -> Result<(), BookingError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tests (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                price DOUBLE PRECISION NOT NULL,
                icon TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(catalog_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                image TEXT NOT NULL,
                availability TEXT NOT NULL,
                specialties TEXT[] NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(catalog_error)?;

        let existing: i64 = sqlx::query("SELECT COUNT(*) AS n FROM tests")
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("n"))
            .map_err(catalog_error)?;

        if existing == 0 {
            info!("Seeding catalog tables");
            self.seed(&seed_tests(), &seed_doctors()).await?;
        }
        Ok(())
    }

    async fn seed(&self, tests: &[MedicalTest], doctors: &[Doctor]) -> Result<(), BookingError> {
        for test in tests {
            sqlx::query(
                "INSERT INTO tests (id, name, description, price, icon) VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(&test.id)
            .bind(&test.name)
            .bind(&test.description)
            .bind(test.price)
            .bind(&test.icon)
            .execute(&self.pool)
            .await
            .map_err(catalog_error)?;
        }

        for doctor in doctors {
            sqlx::query(
                "INSERT INTO doctors (id, name, image, availability, specialties) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
            )
            .bind(&doctor.id)
            .bind(&doctor.name)
            .bind(&doctor.image)
            .bind(&doctor.availability)
            .bind(&doctor.specialties)
            .execute(&self.pool)
            .await
            .map_err(catalog_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn list_tests(&self) -> Result<Vec<MedicalTest>, BookingError> {
        let rows = sqlx::query("SELECT id, name, description, price, icon FROM tests ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(catalog_error)?;
        rows.iter().map(test_from_row).collect()
    }

    async fn get_test(&self, id: &str) -> Result<Option<MedicalTest>, BookingError> {
        let row = sqlx::query("SELECT id, name, description, price, icon FROM tests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(catalog_error)?;
        row.as_ref().map(test_from_row).transpose()
    }

    async fn get_doctor(&self, id: &str) -> Result<Option<Doctor>, BookingError> {
        let row = sqlx::query(
            "SELECT id, name, image, availability, specialties FROM doctors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_error)?;
        row.as_ref().map(doctor_from_row).transpose()
    }

    async fn doctors_for_test(&self, test_id: &str) -> Result<Vec<Doctor>, BookingError> {
        let rows = sqlx::query(
            "SELECT id, name, image, availability, specialties FROM doctors \
             WHERE $1 = ANY(specialties) ORDER BY id",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_error)?;
        rows.iter().map(doctor_from_row).collect()
    }
}

fn test_from_row(row: &PgRow) -> Result<MedicalTest, BookingError> {
    Ok(MedicalTest {
        id: row.try_get("id").map_err(catalog_error)?,
        name: row.try_get("name").map_err(catalog_error)?,
        description: row.try_get("description").map_err(catalog_error)?,
        price: row.try_get("price").map_err(catalog_error)?,
        icon: row.try_get("icon").map_err(catalog_error)?,
    })
}

fn doctor_from_row(row: &PgRow) -> Result<Doctor, BookingError> {
    Ok(Doctor {
        id: row.try_get("id").map_err(catalog_error)?,
        name: row.try_get("name").map_err(catalog_error)?,
        image: row.try_get("image").map_err(catalog_error)?,
        availability: row.try_get("availability").map_err(catalog_error)?,
        specialties: row.try_get("specialties").map_err(catalog_error)?,
    })
}

fn catalog_error(e: sqlx::Error) -> BookingError {
    BookingError::Catalog(e.to_string())
}

fn seed_tests() -> Vec<MedicalTest> {
    vec![
        MedicalTest {
            id: "t1".to_string(),
            name: "Comprehensive Blood Panel".to_string(),
            description: "A full-spectrum blood test covering all major health markers."
                .to_string(),
            price: 150.0,
            icon: "blood".to_string(),
        },
        MedicalTest {
            id: "t2".to_string(),
            name: "Allergy Testing".to_string(),
            description: "Identifies common environmental and food allergies.".to_string(),
            price: 250.0,
            icon: "allergy".to_string(),
        },
        MedicalTest {
            id: "t3".to_string(),
            name: "Diagnostic Imaging (X-Ray)".to_string(),
            description: "Standard X-ray imaging for bones and internal structures.".to_string(),
            price: 300.0,
            icon: "xray".to_string(),
        },
    ]
}

fn seed_doctors() -> Vec<Doctor> {
    let doctor = |id: &str, name: &str, availability: &str, specialties: &[&str]| Doctor {
        id: id.to_string(),
        name: name.to_string(),
        image: "https://placehold.co/100x100".to_string(),
        availability: availability.to_string(),
        specialties: specialties.iter().map(|s| s.to_string()).collect(),
    };

    vec![
        doctor(
            "d1",
            "Dr. Evelyn Reed",
            "Monday-Friday, 9:00 AM - 5:00 PM",
            &["t1", "t2"],
        ),
        doctor(
            "d2",
            "Dr. Julian Hayes",
            "Tuesday, Thursday, Friday, 10:00 AM - 6:00 PM",
            &["t1"],
        ),
        doctor(
            "d3",
            "Dr. Anya Sharma",
            "Monday, Wednesday, 8:00 AM - 4:00 PM",
            &["t3"],
        ),
        doctor(
            "d4",
            "Dr. Marcus Thorne",
            "Wednesday-Friday, 11:00 AM - 7:00 PM",
            &["t2", "t3"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(doctors: &[Doctor]) -> Vec<&str> {
        doctors.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn doctors_are_filtered_by_specialty() {
        let catalog = InMemoryCatalog::seeded();

        let xray = catalog.doctors_for_test("t3").await.unwrap();
        assert_eq!(ids(&xray), vec!["d3", "d4"]);

        let blood = catalog.doctors_for_test("t1").await.unwrap();
        assert_eq!(ids(&blood), vec!["d1", "d2"]);

        assert!(catalog.doctors_for_test("t9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_seeded_doctor_performs_a_seeded_test() {
        let catalog = InMemoryCatalog::seeded();
        let tests = catalog.list_tests().await.unwrap();
        assert_eq!(tests.len(), 3);

        for test in &tests {
            for doctor in catalog.doctors_for_test(&test.id).await.unwrap() {
                assert!(doctor.performs(&test.id));
            }
        }
    }

    #[tokio::test]
    async fn lookups_by_id() {
        let catalog = InMemoryCatalog::seeded();
        assert_eq!(
            catalog.get_test("t2").await.unwrap().map(|t| t.price),
            Some(250.0)
        );
        assert_eq!(
            catalog.get_doctor("d1").await.unwrap().map(|d| d.name),
            Some("Dr. Evelyn Reed".to_string())
        );
        assert!(catalog.get_doctor("d9").await.unwrap().is_none());
    }
}
