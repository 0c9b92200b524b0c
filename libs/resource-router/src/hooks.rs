//! Lifecycle extension points around create/update/delete.
//!
//! Each hook is optional. Hooks receive an owned [`HookContext`] and copies of
//! the records involved; they never get a handle on the router. A hook must
//! not call back into the router's own write path for the same resource: that
//! would run masks, validation and hooks a second time for one request.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use resource_security::Actor;

use crate::model::Record;
use crate::operation::Operation;

/// What a hook knows about the request that triggered it.
#[derive(Clone, Debug)]
pub struct HookContext {
    pub actor: Option<Actor>,
    pub operation: Operation,
    /// Concrete model name (variant name when one was resolved).
    pub model: String,
}

pub type HookFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// `pre*` hook. `Ok(None)` aborts the operation without persisting.
pub type PreHook = Arc<dyn Fn(HookContext, Record) -> HookFuture<Option<Record>> + Send + Sync>;
/// `postCreate(record)`.
pub type PostCreateHook = Arc<dyn Fn(HookContext, Record) -> HookFuture<()> + Send + Sync>;
/// `postUpdate(record, body)`.
pub type PostUpdateHook = Arc<dyn Fn(HookContext, Record, Record) -> HookFuture<()> + Send + Sync>;
/// `postDelete()`.
pub type PostDeleteHook = Arc<dyn Fn(HookContext) -> HookFuture<()> + Send + Sync>;

/// The six extension points of a resource.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) pre_create: Option<PreHook>,
    pub(crate) post_create: Option<PostCreateHook>,
    pub(crate) pre_update: Option<PreHook>,
    pub(crate) post_update: Option<PostUpdateHook>,
    pub(crate) pre_delete: Option<PreHook>,
    pub(crate) post_delete: Option<PostDeleteHook>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives the transformed body; returns the body to persist.
    #[must_use]
    pub fn pre_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Record>>> + Send + 'static,
    {
        self.pre_create = Some(Arc::new(move |ctx, body| Box::pin(f(ctx, body))));
        self
    }

    #[must_use]
    pub fn post_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.post_create = Some(Arc::new(move |ctx, record| Box::pin(f(ctx, record))));
        self
    }

    /// Receives the transformed patch body; returns the patch to merge.
    #[must_use]
    pub fn pre_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Record>>> + Send + 'static,
    {
        self.pre_update = Some(Arc::new(move |ctx, body| Box::pin(f(ctx, body))));
        self
    }

    #[must_use]
    pub fn post_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Record, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.post_update = Some(Arc::new(move |ctx, record, body| {
            Box::pin(f(ctx, record, body))
        }));
        self
    }

    /// Receives the stored record. Any `Some` proceeds; the value is discarded.
    #[must_use]
    pub fn pre_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HookContext, Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Record>>> + Send + 'static,
    {
        self.pre_delete = Some(Arc::new(move |ctx, record| Box::pin(f(ctx, record))));
        self
    }

    #[must_use]
    pub fn post_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.post_delete = Some(Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pre_create.is_none()
            && self.post_create.is_none()
            && self.pre_update.is_none()
            && self.post_update.is_none()
            && self.pre_delete.is_none()
            && self.post_delete.is_none()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_create", &self.pre_create.is_some())
            .field("post_create", &self.post_create.is_some())
            .field("pre_update", &self.pre_update.is_some())
            .field("post_update", &self.post_update.is_some())
            .field("pre_delete", &self.pre_delete.is_some())
            .field("post_delete", &self.post_delete.is_some())
            .finish()
    }
}
