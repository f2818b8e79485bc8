//! SQLite implementation of the RuleRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{DetectionRule, RuleSeverity, RuleSource};
use crate::domain::ports::RuleRepository;

#[derive(Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: &DetectionRule) -> CoreResult<()> {
        let matcher = serde_json::to_string(&rule.matcher)?;
        sqlx::query(
            r#"INSERT INTO detection_rules
               (id, name, matcher, cpe_template, severity, enabled, source, rule_type,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(rule.id.to_string())
        .bind(&rule.name)
        .bind(&matcher)
        .bind(&rule.cpe_template)
        .bind(rule.severity.as_str())
        .bind(rule.enabled)
        .bind(rule.source.as_str())
        .bind(&rule.rule_type)
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<DetectionRule>> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM detection_rules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, rule: &DetectionRule) -> CoreResult<()> {
        let matcher = serde_json::to_string(&rule.matcher)?;
        let result = sqlx::query(
            r#"UPDATE detection_rules SET name = ?, matcher = ?, cpe_template = ?, severity = ?,
               enabled = ?, source = ?, rule_type = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(&rule.name)
        .bind(&matcher)
        .bind(&rule.cpe_template)
        .bind(rule.severity.as_str())
        .bind(rule.enabled)
        .bind(rule.source.as_str())
        .bind(&rule.rule_type)
        .bind(rule.updated_at.to_rfc3339())
        .bind(rule.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("detection rule {}", rule.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM detection_rules WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("detection rule {id}")));
        }
        Ok(())
    }

    async fn list_enabled_by_type(&self, rule_type: &str) -> CoreResult<Vec<DetectionRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT * FROM detection_rules WHERE rule_type = ? AND enabled = 1 ORDER BY name",
        )
        .bind(rule_type)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_rule_types(&self) -> CoreResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT rule_type FROM detection_rules ORDER BY rule_type")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    matcher: String,
    cpe_template: Option<String>,
    severity: String,
    enabled: bool,
    source: String,
    rule_type: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RuleRow> for DetectionRule {
    type Error = CoreError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        Ok(DetectionRule {
            id: Uuid::parse_str(&row.id).map_err(|e| CoreError::Validation(e.to_string()))?,
            name: row.name,
            matcher: serde_json::from_str(&row.matcher)?,
            cpe_template: row.cpe_template,
            severity: RuleSeverity::from_str(&row.severity)
                .ok_or_else(|| CoreError::Validation(format!("invalid rule severity: {}", row.severity)))?,
            enabled: row.enabled,
            source: RuleSource::from_str(&row.source)
                .ok_or_else(|| CoreError::Validation(format!("invalid rule source: {}", row.source)))?,
            rule_type: row.rule_type,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

fn parse_ts(raw: &str) -> CoreResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&chrono::Utc))
        .map_err(|e| CoreError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{Expr, Leaf, Operator};

    async fn setup() -> SqliteRuleRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRuleRepository::new(pool)
    }

    fn sample_rule(name: &str, rule_type: &str, enabled: bool) -> DetectionRule {
        let now = chrono::Utc::now();
        DetectionRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            matcher: Expr::Leaf(Leaf {
                field: "banner".to_string(),
                operator: Operator::Contains,
                value: Some(serde_json::json!("Apache")),
            }),
            cpe_template: Some("cpe:2.3:a:apache:http_server:{version}".to_string()),
            severity: RuleSeverity::Medium,
            enabled,
            source: RuleSource::System,
            rule_type: rule_type.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trips_matcher_expr() {
        let repo = setup().await;
        let rule = sample_rule("apache-fingerprint", "fingerprint", true);
        repo.create(&rule).await.unwrap();

        let fetched = repo.get(rule.id).await.unwrap().unwrap();
        match fetched.matcher {
            Expr::Leaf(leaf) => assert_eq!(leaf.field, "banner"),
            _ => panic!("expected leaf matcher"),
        }
    }

    #[tokio::test]
    async fn list_enabled_by_type_excludes_disabled() {
        let repo = setup().await;
        repo.create(&sample_rule("enabled-one", "fingerprint", true)).await.unwrap();
        repo.create(&sample_rule("disabled-one", "fingerprint", false)).await.unwrap();
        repo.create(&sample_rule("other-type", "poc", true)).await.unwrap();

        let found = repo.list_enabled_by_type("fingerprint").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "enabled-one");
    }

    #[tokio::test]
    async fn list_rule_types_is_distinct() {
        let repo = setup().await;
        repo.create(&sample_rule("a", "fingerprint", true)).await.unwrap();
        repo.create(&sample_rule("b", "fingerprint", true)).await.unwrap();
        repo.create(&sample_rule("c", "poc", true)).await.unwrap();

        let types = repo.list_rule_types().await.unwrap();
        assert_eq!(types, vec!["fingerprint".to_string(), "poc".to_string()]);
    }
}
