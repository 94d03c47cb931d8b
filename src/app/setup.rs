//! Operator tasks run from the command line.

use super::admin::{self, ProductInput};
use super::validation;
use crate::crypto::hash_password;
use crate::error::Result;
use crate::state::AppState;
use crate::types::{Role, User};
use tracing::info;

/// Creates an admin account, or promotes the user who already owns `email`.
/// A promoted user keeps their existing password.
pub fn create_admin(state: &AppState, email: &str, password: &str, name: &str) -> Result<User> {
    let email = validation::normalize_email(email)?;
    if let Some((user, _)) = state.db.find_user_credentials(&email)? {
        state.db.set_user_role(&user.id, Role::Admin)?;
        info!("Promoted existing user {} to admin", user.id);
        return Ok(User {
            role: Role::Admin,
            ..user
        });
    }
    validation::check_password(password)?;
    let name = validation::name(name)?;
    let hash = hash_password(password, state.config.auth.password_iterations)?;
    let user = state.db.insert_user(&email, &name, &hash, Role::Admin)?;
    info!("Created admin {}", user.id);
    Ok(user)
}

struct DemoProduct {
    name: &'static str,
    category: &'static str,
    hair_types: &'static [&'static str],
    price_cents: i64,
    compare_at_cents: Option<i64>,
    stock: i64,
    description: &'static str,
}

const DEMO_CATALOG: &[DemoProduct] = &[
    DemoProduct {
        name: "Curl Defining Cream",
        category: "styling",
        hair_types: &["curly", "coily"],
        price_cents: 1899,
        compare_at_cents: Some(2299),
        stock: 40,
        description: "Shea and flaxseed cream for soft, defined curls without crunch.",
    },
    DemoProduct {
        name: "Hydrating Shampoo",
        category: "shampoo",
        hair_types: &["dry", "curly", "wavy"],
        price_cents: 1450,
        compare_at_cents: None,
        stock: 60,
        description: "Sulfate-free cleanser with aloe and glycerin.",
    },
    DemoProduct {
        name: "Repair Deep Conditioner",
        category: "conditioner",
        hair_types: &["damaged", "dry"],
        price_cents: 2199,
        compare_at_cents: None,
        stock: 25,
        description: "Weekly mask with keratin amino acids for heat-damaged ends.",
    },
    DemoProduct {
        name: "Lightweight Volume Mousse",
        category: "styling",
        hair_types: &["fine", "straight"],
        price_cents: 1599,
        compare_at_cents: None,
        stock: 8,
        description: "Airy foam that lifts at the root and brushes out clean.",
    },
    DemoProduct {
        name: "Scalp Oil",
        category: "treatment",
        hair_types: &["all"],
        price_cents: 2499,
        compare_at_cents: Some(2999),
        stock: 30,
        description: "Rosemary and jojoba blend for a calm, balanced scalp.",
    },
    DemoProduct {
        name: "Wide Tooth Comb",
        category: "tools",
        hair_types: &["curly", "coily", "wavy"],
        price_cents: 799,
        compare_at_cents: None,
        stock: 100,
        description: "Seamless cellulose comb for detangling wet hair.",
    },
];

/// Inserts the demo catalog. Products whose name already exists are skipped.
/// Returns how many were added.
pub fn seed_catalog(state: &AppState) -> Result<usize> {
    let mut added = 0;
    for demo in DEMO_CATALOG {
        let slug = validation::slugify(demo.name);
        if state.db.slug_exists(&slug)? {
            continue;
        }
        admin::create_product(
            state,
            &ProductInput {
                name: demo.name.to_string(),
                description: demo.description.to_string(),
                category: demo.category.to_string(),
                hair_types: demo.hair_types.iter().map(|h| h.to_string()).collect(),
                price_cents: demo.price_cents,
                compare_at_cents: demo.compare_at_cents,
                stock: demo.stock,
                image_url: None,
                active: true,
            },
        )?;
        added += 1;
    }
    info!("Seeded {} demo product(s)", added);
    Ok(added)
}
