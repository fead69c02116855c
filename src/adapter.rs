use std::sync::Arc;

use tracing::warn;

use crate::errors::Result;
use crate::models::PolicyRule;
use crate::storage::StorageDriver;

/// Surface of the policy engine's in-memory model that persistence needs.
pub trait PolicyModel {
    /// Feeds one encoded policy line, e.g. `"p, alice, data1, read"`.
    fn load_policy_line(&mut self, line: &str);

    /// Ordered rules per policy type under one section, conventionally
    /// `"p"` or `"g"`.
    fn section_rules(&self, section: &str) -> Vec<(String, Vec<Vec<String>>)>;
}

/// Persists an ordered policy document as a JSON array behind a storage
/// driver.
///
/// The adapter keeps the single authoritative in-memory mirror of the remote
/// blob; every mutation re-encodes the whole document and pushes it before
/// returning. A failed push leaves the in-memory document ahead of the
/// remote copy, so callers should retry the whole mutating call.
pub struct PolicyAdapter {
    driver: Option<Arc<dyn StorageDriver>>,
    remote_path: String,
    /// Latest encoded form of the document.
    source: Vec<u8>,
    policy: Vec<PolicyRule>,
}

impl PolicyAdapter {
    /// `defaults` seeds the document when the remote copy is unavailable.
    /// With `force`, the defaults replace whatever the remote holds and are
    /// pushed back immediately, establishing a known remote state; push
    /// failures at construction are logged, not returned.
    pub async fn new(
        driver: Option<Arc<dyn StorageDriver>>,
        remote_path: impl Into<String>,
        defaults: Vec<u8>,
        force: bool,
    ) -> Self {
        let mut adapter = Self {
            driver,
            remote_path: remote_path.into(),
            source: defaults,
            policy: Vec::new(),
        };

        if force {
            if let Err(err) = adapter.load_from_source() {
                warn!("failed to decode default policy document: {}", err);
            }
            if let Err(err) = adapter.persist().await {
                warn!("failed to push default policy document: {}", err);
            }
        } else if let Some(driver) = &adapter.driver {
            match driver.get_data(&adapter.remote_path).await {
                Ok(content) => adapter.source = content,
                Err(err) => warn!("falling back to default policy document: {}", err),
            }
        }

        adapter
    }

    /// Number of rows currently held in memory.
    pub fn len(&self) -> usize {
        self.policy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy.is_empty()
    }

    /// The in-memory document, in persisted order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.policy
    }

    fn load_from_source(&mut self) -> Result<()> {
        if self.source.is_empty() {
            return Ok(());
        }
        self.policy = serde_json::from_slice(&self.source)?;
        Ok(())
    }

    async fn persist(&mut self) -> Result<()> {
        let data = serde_json::to_vec(&self.policy)?;
        self.source = data.clone();
        match &self.driver {
            Some(driver) => driver.update_data(data, &self.remote_path).await,
            None => Ok(()),
        }
    }

    /// Decodes the current document and feeds each row to the model as a
    /// compacted policy line.
    pub async fn load_policy(&mut self, model: &mut impl PolicyModel) -> Result<()> {
        self.load_from_source()?;
        for rule in &self.policy {
            model.load_policy_line(&rule.as_line());
        }
        Ok(())
    }

    /// Replaces the whole document with the model's rule sections, `"p"`
    /// before `"g"`, preserving each section's order, then persists.
    pub async fn save_policy(&mut self, model: &impl PolicyModel) -> Result<()> {
        let mut rules = Vec::new();
        for section in ["p", "g"] {
            for (ptype, section_rules) in model.section_rules(section) {
                rules.extend(
                    section_rules
                        .iter()
                        .map(|rule| PolicyRule::from_rule(&ptype, rule)),
                );
            }
        }
        self.policy = rules;
        self.persist().await
    }

    /// Appends one row and persists synchronously.
    pub async fn add_policy(&mut self, _sec: &str, ptype: &str, rule: &[String]) -> Result<()> {
        self.policy.push(PolicyRule::from_rule(ptype, rule));
        self.persist().await
    }

    /// Removes at most one row matching the ptype and all six fields,
    /// preserving the order of the rest. No match is a success and skips the
    /// persist.
    pub async fn remove_policy(&mut self, _sec: &str, ptype: &str, rule: &[String]) -> Result<()> {
        let mut target = rule.to_vec();
        target.resize(6, String::new());

        let position = self.policy.iter().position(|line| {
            line.ptype == ptype
                && line
                    .fields()
                    .iter()
                    .zip(&target)
                    .all(|(field, value)| *field == value.as_str())
        });

        match position {
            Some(index) => {
                self.policy.remove(index);
                self.persist().await
            }
            None => Ok(()),
        }
    }

    /// Removes every row of the given ptype whose fields match the supplied
    /// values starting at `field_index`; empty values are wildcards. The
    /// document is persisted whether or not anything matched.
    pub async fn remove_filtered_policy(
        &mut self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<()> {
        self.policy.retain(|line| {
            if line.ptype != ptype {
                return true;
            }

            let mut matched = true;
            for (offset, value) in field_values.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                if let Some(field) = line.field(field_index + offset) {
                    if field != value.as_str() {
                        matched = false;
                        break;
                    }
                }
            }
            !matched
        });

        self.persist().await
    }
}
