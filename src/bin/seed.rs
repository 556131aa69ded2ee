//! Seeds a development database with one account per role and a mentor
//! assignment, then prints a per-role summary.
//!
//! Safe to run repeatedly: existing emails are left untouched.

use outpass::config::Config;
use outpass::db;
use outpass::models::mentor_assignment::MentorAssignment;
use outpass::models::user::{CreateUserData, User, UserRole};
use outpass::services::password;

const SEED_PASSWORD: &str = "changeme123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outpass=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let hod = ensure_user(&pool, "hod@campus.edu", "Dr. Head Of Department", UserRole::Hod, None).await?;
    let _security =
        ensure_user(&pool, "gate@campus.edu", "Main Gate Security", UserRole::Security, None).await?;
    let mentor =
        ensure_user(&pool, "mentor@campus.edu", "Prof. Mentor", UserRole::Mentor, None).await?;
    let student_one = ensure_user(
        &pool,
        "student1@campus.edu",
        "Student One",
        UserRole::Student,
        Some("9000000001".to_string()),
    )
    .await?;
    let student_two = ensure_user(
        &pool,
        "student2@campus.edu",
        "Student Two",
        UserRole::Student,
        Some("9000000002".to_string()),
    )
    .await?;

    MentorAssignment::assign(&pool, student_one.id, mentor.id).await?;
    MentorAssignment::assign(&pool, student_two.id, mentor.id).await?;

    println!("Seeded users (password: {SEED_PASSWORD}):");
    for role in [
        UserRole::Hod,
        UserRole::Mentor,
        UserRole::Security,
        UserRole::Student,
    ] {
        let count = User::count_by_role(&pool, role).await?;
        println!("  {role}: {count}");
    }
    println!("HOD account: {}", hod.email);

    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    role: UserRole,
    parent_mobile: Option<String>,
) -> anyhow::Result<User> {
    if let Some(existing) = User::find_by_email(pool, email).await? {
        tracing::info!(email, "User already exists, skipping");
        return Ok(existing);
    }

    let user = User::create(
        pool,
        CreateUserData {
            email: email.to_string(),
            name: name.to_string(),
            role,
            mobile: "9999999999".to_string(),
            parent_mobile,
            password_hash: password::hash(SEED_PASSWORD)?,
        },
    )
    .await?;

    tracing::info!(email, %role, "User created");

    Ok(user)
}
