//! Target Provider.
//!
//! Resolves a stage's declarative [`TargetPolicy`] plus the enclosing
//! project's seed targets into a concrete, deduplicated target list.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Target, TargetPolicy, TargetSourceKind};
use crate::domain::ports::TargetQueryProvider;

/// Resolves target sources into a flat, deduplicated [`Target`] list.
pub struct TargetResolver {
    query_provider: Arc<dyn TargetQueryProvider>,
}

impl TargetResolver {
    pub fn new(query_provider: Arc<dyn TargetQueryProvider>) -> Self {
        Self { query_provider }
    }

    /// Resolve `policy` against `seed_targets`, applying the policy's own
    /// whitelist and skip rule, and deduplicating by `(value, type)` in
    /// first-seen order.
    pub async fn resolve(
        &self,
        policy: &TargetPolicy,
        seed_targets: &[String],
    ) -> CoreResult<Vec<Target>> {
        let mut resolved = Vec::new();

        if policy.sources.is_empty() {
            resolved.extend(seed_targets.iter().map(|v| Target::new(v.clone(), "seed")));
        } else {
            for source in &policy.sources {
                self.resolve_source(source, seed_targets, &mut resolved).await?;
            }
        }

        let whitelist: HashSet<&str> = policy.whitelist.iter().map(String::as_str).collect();
        resolved.retain(|t| !whitelist.contains(t.value.as_str()));

        if let Some(skip_rule) = &policy.skip_rule {
            resolved.retain(|t| {
                let attrs = target_attrs(t);
                !skip_rule.evaluate(&attrs)
            });
        }

        Ok(dedup_targets(resolved))
    }

    async fn resolve_source(
        &self,
        source: &TargetSourceKind,
        seed_targets: &[String],
        out: &mut Vec<Target>,
    ) -> CoreResult<()> {
        match source {
            TargetSourceKind::Manual { value } => {
                out.extend(
                    value
                        .split([',', ' ', '\n', '\t'])
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(|v| Target::new(v.to_string(), "manual")),
                );
            }
            TargetSourceKind::ProjectTarget => {
                out.extend(seed_targets.iter().map(|v| Target::new(v.clone(), "project_target")));
            }
            TargetSourceKind::File { path } => {
                out.extend(read_target_file(path).await?);
            }
            TargetSourceKind::DbQuery { filter } => {
                out.extend(self.query_provider.query(filter).await?);
            }
            TargetSourceKind::Unknown => {
                tracing::warn!("skipping unrecognized target source kind");
            }
        }
        Ok(())
    }
}

async fn read_target_file(path: &str) -> CoreResult<Vec<Target>> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CoreError::Validation(format!("cannot read target file {path}: {e}")))?;
    let mut lines = tokio::io::BufReader::new(file).lines();
    let mut out = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| CoreError::Validation(format!("error reading target file {path}: {e}")))?
    {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            out.push(Target::new(trimmed.to_string(), "file"));
        }
    }
    Ok(out)
}

fn target_attrs(target: &Target) -> crate::domain::models::AttrMap {
    use crate::domain::models::AttrValue;
    let mut attrs = crate::domain::models::AttrMap::new();
    attrs.insert("value".to_string(), AttrValue::String(target.value.clone()));
    attrs.insert(
        "type".to_string(),
        AttrValue::String(format!("{:?}", target.target_type).to_lowercase()),
    );
    attrs.insert("source".to_string(), AttrValue::String(target.source.clone()));
    attrs
}

fn dedup_targets(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|t| seen.insert(t.dedup_key()))
        .collect()
}
