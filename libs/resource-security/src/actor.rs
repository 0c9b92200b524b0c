/// `Actor` encapsulates the caller of a single request.
///
/// Built by the external authentication step and attached to the request before the
/// router runs. The router never persists it; absence of an actor means a fully
/// anonymous caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Actor {
    /// Stable identifier of the caller. Compared by string equality against a
    /// record's owner field.
    id: String,
    /// Administrators see and write every field and pass admin-gated rules.
    #[serde(default)]
    admin: bool,
    /// Anonymous accounts carry an id but are never treated as authenticated.
    #[serde(default)]
    is_anonymous: bool,
}

impl Actor {
    /// Create a new `Actor` builder
    #[must_use]
    pub fn builder() -> ActorBuilder {
        ActorBuilder::default()
    }

    /// Shorthand for an authenticated, non-admin actor.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self::builder().id(id).build()
    }

    /// Shorthand for an authenticated administrator.
    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self::builder().id(id).admin(true).build()
    }

    /// Shorthand for an anonymous account (has an id, no trust).
    #[must_use]
    pub fn anonymous(id: impl Into<String>) -> Self {
        Self::builder().id(id).anonymous(true).build()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    /// True for a non-anonymous actor.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.is_anonymous
    }
}

#[derive(Default)]
pub struct ActorBuilder {
    id: Option<String>,
    admin: bool,
    is_anonymous: bool,
}

impl ActorBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    #[must_use]
    pub fn anonymous(mut self, is_anonymous: bool) -> Self {
        self.is_anonymous = is_anonymous;
        self
    }

    #[must_use]
    pub fn build(self) -> Actor {
        Actor {
            id: self.id.unwrap_or_default(),
            admin: self.admin,
            is_anonymous: self.is_anonymous,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_actor_builder_full() {
        let actor = Actor::builder().id("u-1").admin(true).build();

        assert_eq!(actor.id(), "u-1");
        assert!(actor.is_admin());
        assert!(actor.is_authenticated());
    }

    #[test]
    fn test_actor_builder_minimal() {
        let actor = Actor::builder().build();

        assert_eq!(actor.id(), "");
        assert!(!actor.is_admin());
        assert!(!actor.is_anonymous());
    }

    #[test]
    fn test_anonymous_actor_is_not_authenticated() {
        let actor = Actor::anonymous("anon-7");

        assert_eq!(actor.id(), "anon-7");
        assert!(actor.is_anonymous());
        assert!(!actor.is_authenticated());
    }

    #[test]
    fn test_actor_deserialize_defaults_flags() {
        let actor: Actor = serde_json::from_str(r#"{"id":"u-2"}"#).unwrap();

        assert_eq!(actor, Actor::user("u-2"));
    }

    #[test]
    fn test_actor_serialize_roundtrip_keeps_admin() {
        let original = Actor::admin("root");

        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: Actor = serde_json::from_str(&serialized).unwrap();

        assert!(deserialized.is_admin());
        assert_eq!(deserialized.id(), "root");
    }
}
