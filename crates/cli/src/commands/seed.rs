//! Seed the product catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Spaghetti
//!   price: "1.99"
//!   tags: [pasta, dry-goods]
//! - name: Parmesan
//!   price: "4.50"
//!   tags: cheese
//! ```
//!
//! Rows are inserted with `ON CONFLICT (name) DO NOTHING`, so re-running the
//! command against a populated catalog only adds what is missing.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info};

use cartwise_core::Price;
use cartwise_storefront::db;

/// Tags may be written as a comma-separated string or a list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SeedTags {
    Joined(String),
    List(Vec<String>),
}

impl Default for SeedTags {
    fn default() -> Self {
        Self::Joined(String::new())
    }
}

impl SeedTags {
    /// Tags in the stored comma-separated form.
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Joined(s) => s.trim().to_string(),
            Self::List(tags) => tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// One product entry in the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub tags: SeedTags,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: u64,
    pub skipped: u64,
}

/// Parse the YAML body of a product seed file.
///
/// # Errors
///
/// Returns `serde_yaml::Error` if the document is not a list of products.
pub fn parse_seed_file(content: &str) -> Result<Vec<ProductSeed>, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Check every entry, returning one message per problem.
#[must_use]
pub fn validate_seeds(seeds: &[ProductSeed]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (index, seed) in seeds.iter().enumerate() {
        let name = seed.name.trim();
        if name.is_empty() {
            errors.push(format!("entry {index}: name is empty"));
            continue;
        }
        if let Err(e) = Price::new(seed.price) {
            errors.push(format!("{name}: {e}"));
        }
        if !seen.insert(name.to_lowercase()) {
            errors.push(format!("{name}: duplicate name"));
        }
    }

    errors
}

/// Insert products from a YAML file.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or fails validation, or an insert fails.
pub async fn products(path: &Path) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let database_url = super::database_url().ok_or("STOREFRONT_DATABASE_URL not set")?;

    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    info!(path = %path.display(), "Loading products from file");

    // Read and validate before connecting
    let content = tokio::fs::read_to_string(path).await?;
    let seeds = parse_seed_file(&content)?;

    let errors = validate_seeds(&seeds);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    info!(products = seeds.len(), "Seed file validated");

    let pool = db::create_pool(&database_url).await?;
    let summary = insert_products(&pool, &seeds).await?;
    pool.close().await;

    info!("Seeding complete!");
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products skipped (already exist): {}", summary.skipped);

    Ok(summary)
}

async fn insert_products(pool: &PgPool, seeds: &[ProductSeed]) -> Result<SeedSummary, sqlx::Error> {
    let mut summary = SeedSummary::default();
    let mut tx = pool.begin().await?;

    for seed in seeds {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.product (name, price, tags)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            ",
        )
        .bind(seed.name.trim())
        .bind(seed.price)
        .bind(seed.tags.joined())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            summary.skipped += 1;
        } else {
            summary.inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_tag_forms() {
        let seeds = parse_seed_file(
            r#"
- name: Spaghetti
  price: "1.99"
  tags: [pasta, " dry-goods "]
- name: Parmesan
  price: "4.50"
  tags: cheese
- name: Water
  price: "0"
"#,
        )
        .unwrap();

        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].price, Decimal::new(199, 2));
        assert_eq!(seeds[0].tags.joined(), "pasta,dry-goods");
        assert_eq!(seeds[1].tags.joined(), "cheese");
        assert_eq!(seeds[2].tags.joined(), "");
        assert!(validate_seeds(&seeds).is_empty());
    }

    #[test]
    fn test_validation_reports_each_problem() {
        let seeds = vec![
            ProductSeed {
                name: "  ".to_string(),
                price: Decimal::ONE,
                tags: SeedTags::default(),
            },
            ProductSeed {
                name: "Basil".to_string(),
                price: Decimal::new(-1, 0),
                tags: SeedTags::default(),
            },
            ProductSeed {
                name: "basil".to_string(),
                price: Decimal::ONE,
                tags: SeedTags::default(),
            },
        ];

        let errors = validate_seeds(&seeds);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("name is empty"));
        assert!(errors[2].contains("duplicate"));
    }

    #[test]
    fn test_rejects_non_list_document() {
        assert!(parse_seed_file("name: Spaghetti").is_err());
    }
}
