use chrono::{Duration, Utc};
use medfex::{
    auth,
    db::{
        self,
        medicines::{self, NewMedicine},
        models::{RequestKind, Role},
        prescriptions::{self, NewPrescription},
        requests::{self, NewRequest},
        users::{self, NewUser},
    },
    Error,
};
use rand::Rng;
use sqlx::SqlitePool;

const DEMO_PASSWORD: &str = "password123";

struct SeedUser {
    name: &'static str,
    email: &'static str,
    role: Role,
}

struct SeedMedicine {
    name: &'static str,
    category: &'static str,
    price: f64,
    description: &'static str,
}

struct SeedPrescription {
    medicine_name: &'static str,
    dosage: &'static str,
    refill_days: i64,
    started_days_ago: i64,
}

fn get_seed_data() -> (Vec<SeedUser>, Vec<SeedMedicine>, Vec<SeedPrescription>) {
    let seed_users = vec![
        SeedUser {
            name: "City Pharmacy",
            email: "pharmacy@medfex.test",
            role: Role::Retailer,
        },
        SeedUser {
            name: "Jane Customer",
            email: "jane@medfex.test",
            role: Role::Customer,
        },
    ];

    let seed_medicines = vec![
        SeedMedicine {
            name: "Aspirin 81mg",
            category: "Pain Relief",
            price: 4.99,
            description: "Low-dose aspirin tablets",
        },
        SeedMedicine {
            name: "Paracetamol 500mg",
            category: "Pain Relief",
            price: 3.49,
            description: "Fever and pain relief",
        },
        SeedMedicine {
            name: "Amoxicillin 250mg",
            category: "Antibiotic",
            price: 12.00,
            description: "Broad-spectrum antibiotic capsules",
        },
        SeedMedicine {
            name: "Lisinopril 10mg",
            category: "Cardiovascular",
            price: 9.75,
            description: "ACE inhibitor for blood pressure",
        },
        SeedMedicine {
            name: "Amlodipine 5mg",
            category: "Cardiovascular",
            price: 8.25,
            description: "Calcium channel blocker",
        },
        SeedMedicine {
            name: "Metoprolol 50mg",
            category: "Cardiovascular",
            price: 7.90,
            description: "Beta blocker tablets",
        },
        SeedMedicine {
            name: "Metformin 500mg",
            category: "Diabetes",
            price: 6.50,
            description: "First-line type 2 diabetes treatment",
        },
        SeedMedicine {
            name: "Omeprazole 20mg",
            category: "Digestive",
            price: 10.40,
            description: "Proton pump inhibitor",
        },
        SeedMedicine {
            name: "Albuterol Inhaler",
            category: "Respiratory",
            price: 24.00,
            description: "Rescue inhaler",
        },
        SeedMedicine {
            name: "Levothyroxine 50mcg",
            category: "Hormone",
            price: 11.20,
            description: "Thyroid hormone replacement",
        },
    ];

    let seed_prescriptions = vec![
        SeedPrescription {
            medicine_name: "Lisinopril",
            dosage: "10mg once daily",
            refill_days: 30,
            started_days_ago: 28,
        },
        SeedPrescription {
            medicine_name: "Metformin",
            dosage: "500mg twice daily",
            refill_days: 60,
            started_days_ago: 10,
        },
    ];

    (seed_users, seed_medicines, seed_prescriptions)
}

pub async fn seed_database(pool: &SqlitePool) -> Result<(), Error> {
    let (seed_users, seed_medicines, seed_prescriptions) = get_seed_data();

    if users::find_by_email(pool, seed_users[0].email).await?.is_some() {
        log::info!("Demo data already present, nothing to do");
        return Ok(());
    }

    let password_hash = auth::hash_password(DEMO_PASSWORD, bcrypt::DEFAULT_COST)?;
    let mut tx = pool.begin().await?;

    let mut retailer_id = None;
    let mut customer_id = None;
    for user in &seed_users {
        let created = users::insert(
            &mut *tx,
            NewUser {
                name: user.name,
                email: user.email,
                password_hash: &password_hash,
                role: user.role,
            },
        )
        .await?;
        match user.role {
            Role::Retailer => retailer_id = Some(created.id),
            Role::Customer => customer_id = Some(created.id),
        }
    }
    let (Some(retailer_id), Some(customer_id)) = (retailer_id, customer_id) else {
        return Err("seed data needs one retailer and one customer".into());
    };

    let mut rng = rand::thread_rng();
    for medicine in seed_medicines {
        medicines::insert(
            &mut *tx,
            retailer_id,
            NewMedicine {
                name: medicine.name.to_string(),
                category: Some(medicine.category.to_string()),
                price: medicine.price,
                stock: rng.gen_range(0..=120),
                description: Some(medicine.description.to_string()),
            },
        )
        .await?;
    }

    let now = Utc::now();
    for seed in seed_prescriptions {
        let prescription = prescriptions::insert(
            &mut *tx,
            customer_id,
            NewPrescription {
                medicine_name: seed.medicine_name.to_string(),
                dosage: seed.dosage.to_string(),
                refill_days: seed.refill_days,
                start_date: now - Duration::days(seed.started_days_ago),
                image_path: None,
            },
        )
        .await?;

        requests::insert(
            &mut *tx,
            customer_id,
            NewRequest {
                medicine_name: prescription.medicine_name.clone(),
                kind: RequestKind::Refill,
                prescription_id: Some(prescription.id),
                retailer_id: None,
            },
        )
        .await?;
    }

    tx.commit().await?;
    log::info!(
        "Seeded demo accounts {} and {} (password {})",
        seed_users[0].email,
        seed_users[1].email,
        DEMO_PASSWORD
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://medfex.db".to_string());
    let pool = db::init_db(&database_url).await?;
    seed_database(&pool).await?;
    Ok(())
}
