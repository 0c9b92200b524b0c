//! Per-request orchestration.
//!
//! Every operation follows the same shape: resolve the variant, gate on the
//! operation, fetch and gate on the object where there is one, mask the body,
//! run the pre-hook, persist, run the post-hook, serialize. Any step's failure
//! short-circuits with its own [`RouterError`].

mod nested;

use std::sync::Arc;

use resource_security::{Actor, Classification, classify};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::definition::ResourceDefinition;
use crate::error::{HookStage, RouterError};
use crate::hooks::HookContext;
use crate::model::Record;
use crate::operation::Operation;
use crate::query::{QueryParams, build_query};
use crate::store::ResourceStore;
use crate::variant::ResolvedModel;

/// One page of a list response.
#[derive(Clone, Debug, PartialEq)]
pub struct ListPage {
    pub data: Vec<Record>,
    /// True when at least one more record exists past this page.
    pub more: bool,
    pub page: u64,
    pub limit: u64,
}

/// The governed CRUD surface of one resource.
#[derive(Clone)]
pub struct ResourceRouter {
    definition: Arc<ResourceDefinition>,
    store: Arc<dyn ResourceStore>,
}

fn actor_label(actor: Option<&Actor>) -> &str {
    actor.map_or("anonymous", Actor::id)
}

fn missing_document(id: &str) -> RouterError {
    RouterError::not_found(format!("Could not find document with id {id}"))
}

impl ResourceRouter {
    #[must_use]
    pub fn new(definition: ResourceDefinition, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            definition: Arc::new(definition),
            store,
        }
    }

    #[must_use]
    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.definition.model_name()
    }

    fn denial(&self, operation: Operation, actor: Option<&Actor>) -> String {
        format!(
            "Access to {operation} on {} denied for {}",
            self.model_name(),
            actor_label(actor)
        )
    }

    /// Operation-level gate: runs before any I/O, without a record.
    async fn gate(&self, operation: Operation, actor: Option<&Actor>) -> Result<(), RouterError> {
        if self.definition.permissions.check(operation, actor, None).await {
            return Ok(());
        }
        let message = self.denial(operation, actor);
        if operation.is_read_only() {
            Err(RouterError::Forbidden(message))
        } else {
            Err(RouterError::OperationNotAllowed(message))
        }
    }

    /// Object-level gate against a fetched record.
    async fn gate_record(
        &self,
        operation: Operation,
        actor: Option<&Actor>,
        record: &Record,
    ) -> Result<(), RouterError> {
        if self
            .definition
            .permissions
            .check(operation, actor, Some(record))
            .await
        {
            Ok(())
        } else {
            Err(RouterError::Forbidden(self.denial(operation, actor)))
        }
    }

    /// Fetch a live record through `model`; soft-deleted records and records
    /// of a different variant are not found.
    async fn load(&self, model: &ResolvedModel, id: &str) -> Result<Record, RouterError> {
        let not_found = || missing_document(id);
        let record = self
            .store
            .find_by_id(model, id)
            .await?
            .ok_or_else(not_found)?;
        if !self.definition.registry.record_matches(model, &record) {
            debug!(id, model = model.name(), "Record belongs to another variant");
            return Err(not_found());
        }
        if model.schema().is_soft_deleted(&record) {
            return Err(not_found());
        }
        Ok(record)
    }

    fn hook_context(
        actor: Option<&Actor>,
        operation: Operation,
        model: &ResolvedModel,
    ) -> HookContext {
        HookContext {
            actor: actor.cloned(),
            operation,
            model: model.name().to_owned(),
        }
    }

    fn strip_discriminator(&self, body: &mut Record) {
        body.remove(self.definition.registry.key());
    }

    fn mask_input(
        &self,
        body: Record,
        operation: Operation,
        actor: Option<&Actor>,
        classify_against: &Record,
    ) -> Result<Record, RouterError> {
        let classification = self.classify(actor, classify_against);
        self.definition
            .transformer
            .transform(body, operation, actor, classification)
    }

    fn classify(&self, actor: Option<&Actor>, record: &Record) -> Classification {
        classify(actor, Some(record), &self.definition.owner_field)
    }

    fn serialize(&self, record: &Record, actor: Option<&Actor>) -> Record {
        self.serialize_as(record, actor, self.classify(actor, record))
    }

    /// Serialize with a classification computed earlier, e.g. from the stored
    /// record before its references were populated.
    fn serialize_as(
        &self,
        record: &Record,
        actor: Option<&Actor>,
        classification: Classification,
    ) -> Record {
        let registry = &self.definition.registry;
        let model = registry.for_record(record).unwrap_or_else(|_| registry.base());
        self.definition
            .transformer
            .serialize(record, model.schema(), actor, classification)
    }

    async fn populate(
        &self,
        model: &ResolvedModel,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, RouterError> {
        if self.definition.populate.is_empty() {
            return Ok(records);
        }
        Ok(self
            .store
            .populate(model, records, &self.definition.populate)
            .await?)
    }

    /// One page of records visible to `actor`.
    ///
    /// # Errors
    /// 403 when the actor may not list, 400 for rejected query parameters.
    #[instrument(skip_all, fields(model = %self.model_name(), actor = actor_label(actor)))]
    pub async fn list(
        &self,
        actor: Option<&Actor>,
        params: &QueryParams,
    ) -> Result<ListPage, RouterError> {
        let model = self.definition.registry.base();
        self.gate(Operation::List, actor).await?;

        let baseline = self.definition.baseline(actor);
        let mut plan = build_query(params, &self.definition.query, baseline)?;
        if let Some(flag) = model.schema().soft_delete_field()
            && !plan.filter.contains_key(flag)
        {
            plan.filter
                .insert(flag.to_owned(), serde_json::json!({"$ne": true}));
        }
        if plan.no_results {
            debug!("Baseline filter excludes every record");
            return Ok(ListPage {
                data: Vec::new(),
                more: false,
                page: plan.page,
                limit: plan.limit,
            });
        }

        let mut records = self.store.find(&model, &plan.over_fetch()).await?;
        let limit = usize::try_from(plan.limit).unwrap_or(usize::MAX);
        let more = records.len() > limit;
        records.truncate(limit);

        // classify before populate replaces the owner reference
        let classifications: Vec<Classification> =
            records.iter().map(|r| self.classify(actor, r)).collect();
        let records = self.populate(&model, records).await?;
        let data = records
            .iter()
            .zip(classifications)
            .map(|(r, c)| self.serialize_as(r, actor, c))
            .collect();
        debug!(page = plan.page, more, "Listed records");
        Ok(ListPage {
            data,
            more,
            page: plan.page,
            limit: plan.limit,
        })
    }

    /// # Errors
    /// 405 when the actor may not create at all, 403 for a write-mask
    /// violation or a pre-hook veto, 400 for hook and validation failures.
    #[instrument(skip_all, fields(model = %self.model_name(), actor = actor_label(actor)))]
    pub async fn create(&self, actor: Option<&Actor>, body: Record) -> Result<Record, RouterError> {
        let model = self.definition.registry.resolve(Some(&body))?;
        self.gate(Operation::Create, actor).await?;
        let prepared = self.prepare_create(actor, body)?;
        self.persist_create(actor, &model, prepared).await
    }

    /// Create every element of `bodies`. All bodies pass the write mask before
    /// the first one is persisted.
    ///
    /// # Errors
    /// As [`Self::create`]; the first failure stops the batch.
    #[instrument(
        skip_all,
        fields(model = %self.model_name(), actor = actor_label(actor), count = bodies.len())
    )]
    pub async fn create_many(
        &self,
        actor: Option<&Actor>,
        bodies: Vec<Record>,
    ) -> Result<Vec<Record>, RouterError> {
        self.gate(Operation::Create, actor).await?;
        let mut prepared = Vec::with_capacity(bodies.len());
        for body in bodies {
            let model = self.definition.registry.resolve(Some(&body))?;
            prepared.push((model, self.prepare_create(actor, body)?));
        }
        let mut created = Vec::with_capacity(prepared.len());
        for (model, body) in prepared {
            created.push(self.persist_create(actor, &model, body).await?);
        }
        Ok(created)
    }

    fn prepare_create(
        &self,
        actor: Option<&Actor>,
        mut body: Record,
    ) -> Result<Record, RouterError> {
        self.strip_discriminator(&mut body);
        // no stored record yet: classify against the body itself
        let against = body.clone();
        self.mask_input(body, Operation::Create, actor, &against)
    }

    async fn persist_create(
        &self,
        actor: Option<&Actor>,
        model: &ResolvedModel,
        body: Record,
    ) -> Result<Record, RouterError> {
        let hooks = &self.definition.hooks;
        let body = match &hooks.pre_create {
            Some(hook) => hook(Self::hook_context(actor, Operation::Create, model), body)
                .await
                .map_err(|e| RouterError::hook(HookStage::PreCreate, &e))?
                .ok_or(RouterError::HookAborted {
                    stage: HookStage::PreCreate,
                })?,
            None => body,
        };

        let record = self.store.insert(model, body).await?;

        if let Some(hook) = &hooks.post_create {
            hook(Self::hook_context(actor, Operation::Create, model), record.clone())
                .await
                .map_err(|e| RouterError::hook(HookStage::PostCreate, &e))?;
        }
        let id = self.definition.registry.base_schema().id_of(&record);
        info!(model = model.name(), id = ?id, "Created record");
        Ok(self.serialize(&record, actor))
    }

    /// # Errors
    /// 403 on either permission gate, 404 for a missing or soft-deleted record.
    #[instrument(
        skip_all,
        fields(model = %self.model_name(), actor = actor_label(actor), id = %id)
    )]
    pub async fn read(&self, actor: Option<&Actor>, id: &str) -> Result<Record, RouterError> {
        let base = self.definition.registry.base();
        self.gate(Operation::Read, actor).await?;
        let record = self.load_any(&base, id).await?;
        self.gate_record(Operation::Read, actor, &record).await?;

        let classification = self.classify(actor, &record);
        let mut populated = self.populate(&base, vec![record]).await?;
        let record = populated.pop().ok_or_else(|| missing_document(id))?;
        Ok(self.serialize_as(&record, actor, classification))
    }

    /// Like [`Self::load`], but a base-model read may return any variant.
    async fn load_any(&self, base: &ResolvedModel, id: &str) -> Result<Record, RouterError> {
        let record = self
            .store
            .find_by_id(base, id)
            .await?
            .filter(|r| !base.schema().is_soft_deleted(r) && !self.variant_soft_deleted(r))
            .ok_or_else(|| missing_document(id))?;
        Ok(record)
    }

    fn variant_soft_deleted(&self, record: &Record) -> bool {
        self.definition
            .registry
            .for_record(record)
            .is_ok_and(|m| m.schema().is_soft_deleted(record))
    }

    /// Merge `body` over the stored record and save it with one replace.
    ///
    /// # Errors
    /// 405 at the operation gate, 404 when the record is missing or belongs
    /// to another variant, 403 at the object gate or on a mask violation.
    #[instrument(
        skip_all,
        fields(model = %self.model_name(), actor = actor_label(actor), id = %id)
    )]
    pub async fn update(
        &self,
        actor: Option<&Actor>,
        id: &str,
        mut body: Record,
    ) -> Result<Record, RouterError> {
        let model = self.definition.registry.resolve(Some(&body))?;
        self.gate(Operation::Update, actor).await?;
        let existing = self.load(&model, id).await?;
        self.gate_record(Operation::Update, actor, &existing).await?;

        self.strip_discriminator(&mut body);
        let body = self.mask_input(body, Operation::Update, actor, &existing)?;

        let hooks = &self.definition.hooks;
        let patch = match &hooks.pre_update {
            Some(hook) => hook(Self::hook_context(actor, Operation::Update, &model), body)
                .await
                .map_err(|e| RouterError::hook(HookStage::PreUpdate, &e))?
                .ok_or(RouterError::HookAborted {
                    stage: HookStage::PreUpdate,
                })?,
            None => body,
        };

        let merged = merge(&existing, &patch, model.schema().primary_key());
        let saved = self.store.replace(&model, merged).await?;

        if let Some(hook) = &hooks.post_update {
            hook(
                Self::hook_context(actor, Operation::Update, &model),
                saved.clone(),
                patch,
            )
            .await
            .map_err(|e| RouterError::hook(HookStage::PostUpdate, &e))?;
        }
        debug!("Updated record");
        Ok(self.serialize(&saved, actor))
    }

    /// `variant` names the variant the record belongs to; the base model
    /// cannot delete variant records.
    ///
    /// # Errors
    /// 405 at the operation gate, 404 for a missing or mismatched record, 403
    /// at the object gate or when the pre-delete hook vetoes.
    #[instrument(
        skip_all,
        fields(model = %self.model_name(), actor = actor_label(actor), id = %id)
    )]
    pub async fn delete(
        &self,
        actor: Option<&Actor>,
        id: &str,
        variant: Option<&str>,
    ) -> Result<(), RouterError> {
        let model = self.resolve_named(variant)?;
        self.gate(Operation::Delete, actor).await?;
        let existing = self.load(&model, id).await?;
        self.gate_record(Operation::Delete, actor, &existing).await?;

        let hooks = &self.definition.hooks;
        if let Some(hook) = &hooks.pre_delete {
            hook(
                Self::hook_context(actor, Operation::Delete, &model),
                existing.clone(),
            )
            .await
            .map_err(|e| RouterError::hook(HookStage::PreDelete, &e))?
            .ok_or(RouterError::HookAborted {
                stage: HookStage::PreDelete,
            })?;
        }

        if let Some(flag) = model.schema().soft_delete_field() {
            let mut tombstone = existing;
            tombstone.insert(flag.to_owned(), Value::Bool(true));
            self.store.replace(&model, tombstone).await?;
            info!("Soft-deleted record");
        } else {
            self.store.remove(&model, id).await?;
            info!("Deleted record");
        }

        if let Some(hook) = &hooks.post_delete {
            hook(Self::hook_context(actor, Operation::Delete, &model))
                .await
                .map_err(|e| RouterError::hook(HookStage::PostDelete, &e))?;
        }
        Ok(())
    }

    fn resolve_named(&self, variant: Option<&str>) -> Result<ResolvedModel, RouterError> {
        let registry = &self.definition.registry;
        match variant {
            Some(name) => {
                let mut selector = Record::new();
                selector.insert(registry.key().to_owned(), Value::String(name.to_owned()));
                registry.resolve(Some(&selector))
            }
            None => Ok(registry.base()),
        }
    }
}

/// New record: `existing` with every key of `patch` written over it. The
/// primary key never changes.
fn merge(existing: &Record, patch: &Record, primary_key: &str) -> Record {
    let mut merged = existing.clone();
    for (key, value) in patch {
        if key != primary_key {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_overwrites_but_keeps_primary_key() {
        let existing = json!({"_id": "a", "name": "old", "calories": 1});
        let patch = json!({"_id": "b", "name": "new", "hidden": null});
        let merged = merge(
            existing.as_object().unwrap(),
            patch.as_object().unwrap(),
            "_id",
        );
        assert_eq!(
            Value::Object(merged),
            json!({"_id": "a", "name": "new", "calories": 1, "hidden": null})
        );
    }
}
