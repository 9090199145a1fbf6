//! Start-up tasks shared by `serve` and `init`.

use tracing::info;

use crate::core::{Record, Value};
use crate::facade::StoreFacade;
use crate::query::{Condition, Insert, Select};
use crate::web::auth::{ROLE_ADMIN, hash_password};
use crate::web::error::AppResult;

/// Creates the admin account unless a user with `email` already exists.
/// Returns the admin record either way.
pub async fn seed_admin(
    store: &StoreFacade,
    email: &str,
    password: &str,
    bcrypt_cost: u32,
) -> AppResult<Record> {
    let email = email.trim().to_ascii_lowercase();
    let lookup = Select::from("users").filter(Condition::eq("email", email.as_str()));

    if let Some(existing) = store.find_one(lookup.clone()).await? {
        info!(email = %email, "admin account present");
        return Ok(existing);
    }

    let password_hash = hash_password(password.to_string(), bcrypt_cost).await?;
    let id = store
        .insert(
            Insert::into("users")
                .value("email", email.as_str())
                .value("password_hash", password_hash)
                .value("name", "Administrator")
                .value("role", ROLE_ADMIN)
                .value("verification_status", "verified"),
        )
        .await?;
    store
        .insert(
            Insert::into("notification_preferences")
                .value("user_id", id.clone())
                .value("email_orders", true)
                .value("email_promotions", false)
                .value("sms_orders", false),
        )
        .await?;
    info!(email = %email, id = %id, "admin account created");

    let admin = store.find_one(lookup).await?;
    Ok(admin.unwrap_or_else(|| Record::new().with("id", id).with("email", Value::Text(email))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StoreConfig;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = StoreFacade::open(&StoreConfig::document_in_memory())
            .await
            .unwrap();
        store.init().await.unwrap();

        let first = seed_admin(&store, "Admin@Shop.io", "secret", 4).await.unwrap();
        let second = seed_admin(&store, "admin@shop.io", "other", 4).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.get_str("role"), Some(ROLE_ADMIN));
        assert_eq!(
            store
                .count("users", crate::query::Filter::new())
                .await
                .unwrap(),
            1
        );
    }
}
