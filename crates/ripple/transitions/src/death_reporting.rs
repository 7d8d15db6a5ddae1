//! Death registration
//!
//! Confirm-form reports mark the referenced patient deceased as of the
//! report's date; undo-form reports clear the marking. A patient already
//! in the target state is a no-op, as is a reference that resolves to no
//! contact at all. Such reports are re-evaluated on every later change
//! to the document until a transition executes.

use async_trait::async_trait;
use ripple_config::{ConfigError, ConfigResult, Settings};
use ripple_engine::{RunContext, Transition, TransitionError};
use ripple_storage::DocumentStore;
use ripple_types::{ChangeEvent, Document};
use serde::Deserialize;

const TRANSITION_NAME: &str = "death_reporting";
const CONFIG_SECTION: &str = "death_reporting";

/// Settings section for the rule.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DeathReportingConfig {
    /// Form codes confirming a death
    #[serde(default)]
    pub mark_deceased_forms: Vec<String>,
    /// Form codes undoing a mistaken confirmation
    #[serde(default)]
    pub undo_deceased_forms: Vec<String>,
}

impl DeathReportingConfig {
    fn is_confirm(&self, form: &str) -> bool {
        self.mark_deceased_forms.iter().any(|f| f == form)
    }

    fn is_undo(&self, form: &str) -> bool {
        self.undo_deceased_forms.iter().any(|f| f == form)
    }
}

/// Marks and unmarks linked patient records as deceased.
pub struct DeathReporting;

impl DeathReporting {
    /// Current section, or `None` when absent or unreadable. `init`
    /// guarantees a readable section at startup; a hot reload that breaks
    /// it quietly disables the rule rather than crashing the pass.
    fn config(settings: &Settings) -> Option<DeathReportingConfig> {
        settings.section(CONFIG_SECTION).ok().flatten()
    }
}

#[async_trait]
impl Transition for DeathReporting {
    fn name(&self) -> &'static str {
        TRANSITION_NAME
    }

    fn init(&self, settings: &Settings) -> ConfigResult<()> {
        let config: Option<DeathReportingConfig> = settings.section(CONFIG_SECTION)?;
        let forms = config.map(|c| c.mark_deceased_forms).unwrap_or_default();
        if forms.is_empty() {
            return Err(ConfigError::Transition {
                transition: TRANSITION_NAME.to_string(),
                reason: format!(
                    "settings must define a non-empty '{CONFIG_SECTION}.mark_deceased_forms' list"
                ),
            });
        }
        Ok(())
    }

    fn filter(&self, doc: &Document, settings: &Settings) -> bool {
        let Some(config) = Self::config(settings) else {
            return false;
        };
        let Some(form) = doc.form.as_deref() else {
            return false;
        };
        doc.from.is_some()
            && doc.is_data_record()
            && (config.is_confirm(form) || config.is_undo(form))
            && doc.patient_ref().is_some()
    }

    async fn on_match(
        &self,
        change: &ChangeEvent,
        ctx: &RunContext,
    ) -> Result<bool, TransitionError> {
        let doc = &change.doc;
        let Some(config) = Self::config(&ctx.settings) else {
            return Ok(false);
        };
        let Some(reference) = doc.patient_ref() else {
            return Ok(false);
        };

        let mut patient = match ctx.resolver.resolve(reference).await {
            Ok(patient) => patient,
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    doc_id = %doc.id,
                    reference,
                    "no patient for reference, leaving report for a later pass"
                );
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let form = doc.form.as_deref().unwrap_or_default();
        if config.is_confirm(form) && patient.date_of_death.is_none() {
            patient.date_of_death = doc.reported_date;
        } else if config.is_undo(form) && patient.date_of_death.is_some() {
            patient.date_of_death = None;
        } else {
            // Patient already in the required state
            return Ok(false);
        }

        ctx.store.audited_save(&patient, TRANSITION_NAME).await?;
        tracing::info!(
            doc_id = %doc.id,
            patient_id = %patient.id,
            deceased = patient.date_of_death.is_some(),
            "patient death registration updated"
        );
        Ok(true)
    }
}
