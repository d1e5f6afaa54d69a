//! Dependency-ordered collection of everything Bitrix24 knows about one deal.
//!
//! The run is a fixed list of steps. Each step yields a [`Slot`]; optional resources
//! that cannot be resolved become marker slots, while any `Err` aborts the remaining
//! steps and is recorded on the dossier.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    domain::{DealId, DialogId, UserId},
    dossier::{is_truthy, Dossier, ResourceKey, Slot},
    paginator::{Paginator, DEFAULT_MAX_PAGES},
    params::Params,
    ports::BitrixApi,
    Result,
};

pub const NO_RESPONSIBLE_USER: &str = "no responsible user";
pub const NO_DIALOG: &str = "no dialog";

const USER_FIELDS: &[&str] = &["ID", "NAME", "LAST_NAME", "EMAIL", "WORK_POSITION"];
const OPENLINE_PROVIDER: &str = "IMOPENLINES_SESSION";
const DEAL_OWNER_TYPE: u32 = 2;
const DIALOG_MESSAGE_LIMIT: u32 = 200;

/// Steps that depend on results of earlier calls, in execution order.
const DEPENDENT_STEPS: [Step; 5] = [
    Step::User,
    Step::Timeline,
    Step::Activities,
    Step::DialogMessages,
    Step::OpenlineDialog,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    User,
    Timeline,
    Activities,
    DialogMessages,
    OpenlineDialog,
}

impl Step {
    fn key(self) -> ResourceKey {
        match self {
            Step::User => ResourceKey::User,
            Step::Timeline => ResourceKey::Timeline,
            Step::Activities => ResourceKey::Activities,
            Step::DialogMessages => ResourceKey::DialogMessages,
            Step::OpenlineDialog => ResourceKey::OpenlineDialog,
        }
    }

    fn method(self) -> &'static str {
        match self {
            Step::User => "user.get",
            Step::Timeline => "crm.timeline.comment.list",
            Step::Activities => "crm.activity.list",
            Step::DialogMessages => "im.dialog.messages.get",
            Step::OpenlineDialog => "imopenlines.dialog.get",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    pub max_pages: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Per-run state threaded between steps.
#[derive(Default)]
struct RunState {
    /// `None` until the open-line lookup ran; then the lookup's answer.
    dialog: Option<Option<DialogId>>,
}

pub struct DealAggregator {
    api: Arc<dyn BitrixApi>,
    paginator: Paginator,
    cfg: AggregatorConfig,
}

impl DealAggregator {
    pub fn new(api: Arc<dyn BitrixApi>, paginator: Paginator, cfg: AggregatorConfig) -> Self {
        Self {
            api,
            paginator,
            cfg,
        }
    }

    /// Collect the deal's records. Never fails: a fatal error is stored on the
    /// returned dossier next to whatever was fetched before it.
    pub async fn get_deal_data(&self, deal_id: DealId) -> Dossier {
        let mut dossier = Dossier::new();

        if let Err(e) = self.run(deal_id, &mut dossier).await {
            tracing::error!(deal_id = deal_id.0, error = %e, "deal aggregation aborted");
            dossier.abort(e.to_string());
        }

        tracing::debug!(
            deal_id = deal_id.0,
            keys = ?dossier.keys().map(ResourceKey::as_str).collect::<Vec<_>>(),
            "deal aggregation finished"
        );
        dossier
    }

    async fn run(&self, deal_id: DealId, dossier: &mut Dossier) -> Result<()> {
        let by_id = Params::new().set("id", deal_id);
        let deal = self.fetch_result("crm.deal.get", &by_id).await?;
        dossier.insert(ResourceKey::Deal, Slot::Fetched(deal));

        // NOTE: the contact is looked up with the deal id, not the deal's CONTACT_ID.
        let contact = self.fetch_result("crm.contact.get", &by_id).await?;
        dossier.insert(ResourceKey::Contact, Slot::Fetched(contact));

        let mut state = RunState::default();
        for step in DEPENDENT_STEPS {
            let slot = self.step(step, deal_id, dossier, &mut state).await?;
            dossier.insert(step.key(), slot);
        }
        Ok(())
    }

    async fn step(
        &self,
        step: Step,
        deal_id: DealId,
        dossier: &Dossier,
        state: &mut RunState,
    ) -> Result<Slot> {
        match step {
            Step::User => {
                let Some(user_id) = responsible_user(dossier) else {
                    tracing::warn!(deal_id = deal_id.0, "deal has no ASSIGNED_BY_ID");
                    return Ok(Slot::Failed(NO_RESPONSIBLE_USER.to_string()));
                };
                let params = Params::new()
                    .set("id", &user_id.0)
                    .list("select", USER_FIELDS);
                let users = self.fetch_result(step.method(), &params).await?;
                Ok(Slot::Fetched(first_record(users)))
            }
            Step::Timeline => {
                let params = Params::new()
                    .filter("ENTITY_ID", deal_id)
                    .filter("ENTITY_TYPE", "deal");
                Ok(Slot::Fetched(self.fetch_pages(step.method(), &params).await))
            }
            Step::Activities => {
                let params = Params::new()
                    .filter("OWNER_ID", deal_id)
                    .filter("OWNER_TYPE_ID", DEAL_OWNER_TYPE);
                Ok(Slot::Fetched(self.fetch_pages(step.method(), &params).await))
            }
            Step::DialogMessages | Step::OpenlineDialog => {
                let Some(dialog_id) = self.dialog_id(deal_id, state).await else {
                    return Ok(Slot::Missing(NO_DIALOG.to_string()));
                };
                let mut params = Params::new().set("DIALOG_ID", &dialog_id.0);
                if step == Step::DialogMessages {
                    params = params.set("LIMIT", DIALOG_MESSAGE_LIMIT);
                }
                Ok(Slot::Fetched(
                    self.fetch_result(step.method(), &params).await?,
                ))
            }
        }
    }

    async fn dialog_id(&self, deal_id: DealId, state: &mut RunState) -> Option<DialogId> {
        if let Some(cached) = &state.dialog {
            return cached.clone();
        }
        let found = self.lookup_dialog_id(deal_id).await;
        state.dialog = Some(found.clone());
        found
    }

    /// Find the open-line chat attached to the deal via its activity log.
    ///
    /// Lookup failures are logged and read as "no dialog".
    async fn lookup_dialog_id(&self, deal_id: DealId) -> Option<DialogId> {
        let params = Params::new()
            .filter("OWNER_ID", deal_id)
            .filter("PROVIDER_ID", OPENLINE_PROVIDER)
            .list("select", &["ASSOCIATED_ENTITY_ID"]);

        let result = match self.fetch_result("crm.activity.list", &params).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(deal_id = deal_id.0, error = %e, "dialog lookup failed");
                return None;
            }
        };

        let first = result.as_array()?.first()?;
        let id = first.get("ASSOCIATED_ENTITY_ID").map(scalar_to_string)?;
        if id.is_empty() || id == "0" {
            return None;
        }
        Some(DialogId(id))
    }

    async fn fetch_result(&self, method: &str, params: &Params) -> Result<Value> {
        let mut envelope = self.api.call(method, params).await?;
        Ok(envelope
            .get_mut("result")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    async fn fetch_pages(&self, method: &str, params: &Params) -> Value {
        Value::Array(
            self.paginator
                .fetch_all(method, params, self.cfg.max_pages)
                .await,
        )
    }
}

fn responsible_user(dossier: &Dossier) -> Option<UserId> {
    let raw = dossier.value(ResourceKey::Deal)?.get("ASSIGNED_BY_ID")?;
    is_truthy(raw).then(|| UserId(scalar_to_string(raw)))
}

/// `user.get` answers with a list; the report wants the single user record.
fn first_record(v: Value) -> Value {
    match v {
        Value::Array(items) => items
            .into_iter()
            .next()
            .unwrap_or_else(|| Value::Object(Map::new())),
        other => other,
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
