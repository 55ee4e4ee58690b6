//! Inheritance by composition: derive a new factory from a parent configuration.
//!
//! `extend` never touches the parent. It merges the parent's configuration with an
//! [`ExtendOptions`] override and runs the result through the same
//! [`AggregateConfig::build`] path as any other factory:
//!
//! | part       | derived value                                                  |
//! |------------|----------------------------------------------------------------|
//! | schema     | `transform(parent schema)`, or the parent schema unchanged      |
//! | identity   | override, or the parent identity field                          |
//! | invariants | parent invariants, then the new ones (parent group checked first) |
//! | historize  | override, or the parent setting                                 |
//! | methods    | derived factory receives the parent's methods, bound to itself  |

use std::sync::Arc;

use domainforge_core::{DomainError, DomainResult, Invariant, SchemaRef};

use crate::factory::{AggregateConfig, AggregateFactory};
use crate::methods::{DerivedMethodFactory, MethodFactory, MethodSet};

type SchemaTransform = Box<dyn FnOnce(SchemaRef) -> SchemaRef>;

/// Overrides for [`AggregateFactory::extend`]. `name` and `methods` are required.
#[derive(Default)]
pub struct ExtendOptions {
    name: String,
    methods: Option<DerivedMethodFactory>,
    schema: Option<SchemaTransform>,
    identity: Option<String>,
    invariants: Vec<Invariant>,
    historize: Option<bool>,
}

impl ExtendOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Derived method factory: `(derived factory, inherited methods) -> methods`.
    ///
    /// Inherited methods already call back into the *derived* factory, so they are
    /// checked against the derived invariant set.
    pub fn methods<F>(mut self, factory: F) -> Self
    where
        F: Fn(&AggregateFactory, MethodSet) -> MethodSet + Send + Sync + 'static,
    {
        self.methods = Some(Arc::new(factory));
        self
    }

    /// Keep every inherited method and add none.
    pub fn inherit_methods(self) -> Self {
        self.methods(|_, inherited| inherited)
    }

    pub fn schema<F>(mut self, transform: F) -> Self
    where
        F: FnOnce(SchemaRef) -> SchemaRef + 'static,
    {
        self.schema = Some(Box::new(transform));
        self
    }

    pub fn identity(mut self, field: impl Into<String>) -> Self {
        self.identity = Some(field.into());
        self
    }

    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.invariants.push(invariant);
        self
    }

    pub fn invariants(mut self, invariants: impl IntoIterator<Item = Invariant>) -> Self {
        self.invariants.extend(invariants);
        self
    }

    pub fn historize(mut self, historize: bool) -> Self {
        self.historize = Some(historize);
        self
    }
}

impl AggregateFactory {
    /// Derive a new, independent factory. The parent is left unchanged.
    pub fn extend(&self, options: ExtendOptions) -> DomainResult<AggregateFactory> {
        let ExtendOptions {
            name,
            methods,
            schema,
            identity,
            invariants,
            historize,
        } = options;

        let derived_methods = methods.ok_or_else(|| {
            DomainError::configuration(format!("{name}: extending {} requires a method factory", self.name()))
        })?;

        let schema = match schema {
            Some(transform) => transform(self.schema().clone()),
            None => self.schema().clone(),
        };
        let invariants = self.invariants().concat(invariants)?;

        let inherited = self.method_factory().clone();
        let method_factory: MethodFactory = Arc::new(move |factory: &AggregateFactory| {
            derived_methods(factory, inherited(factory))
        });

        tracing::debug!(parent = self.name(), derived = %name, "extending aggregate");

        AggregateConfig::new(name)
            .schema_ref(schema)
            .identity(identity.unwrap_or_else(|| self.identity().to_string()))
            .invariants(invariants.iter().cloned())
            .historize(historize.unwrap_or_else(|| self.historize()))
            .method_factory(method_factory)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Aggregate, AggregateExt};
    use domainforge_core::{FieldKind, ObjectSchema, Record};
    use serde_json::{Value, json};

    fn account() -> AggregateFactory {
        AggregateFactory::builder("Account")
            .schema(
                ObjectSchema::new()
                    .field("id", FieldKind::string())
                    .field("iban", FieldKind::string())
                    .field("balance", FieldKind::integer()),
            )
            .identity("id")
            .invariant(Invariant::new("non-negative balance", |s: &Record| {
                s.i64("balance").is_some_and(|b| b >= 0)
            }))
            .methods(|factory| {
                let f = factory.clone();
                MethodSet::new().with("withdraw", move |this: &Aggregate, args: Value| {
                    let amount = args.get("amount").and_then(Value::as_i64).unwrap_or(0);
                    let balance = this.data().i64("balance").unwrap_or(0);
                    f.update(this, json!({"balance": balance - amount}))
                })
            })
            .build()
            .unwrap()
    }

    fn savings(parent: &AggregateFactory) -> AggregateFactory {
        parent
            .extend(
                ExtendOptions::new("SavingsAccount")
                    .schema(|base| {
                        ObjectSchema::extending(base)
                            .field("minimum", FieldKind::integer())
                            .into_ref()
                    })
                    .invariant(Invariant::new("balance above minimum", |s: &Record| {
                        s.i64("balance") >= s.i64("minimum")
                    }))
                    .methods(|factory, inherited| {
                        let f = factory.clone();
                        inherited.with("raiseMinimum", move |this: &Aggregate, args: Value| {
                            f.update(this, json!({"minimum": args["to"]}))
                        })
                    }),
            )
            .unwrap()
    }

    #[test]
    fn derived_factory_inherits_and_adds() {
        let base = account();
        let derived = savings(&base);

        assert_eq!(derived.name(), "SavingsAccount");
        assert_eq!(derived.identity(), "id");
        assert_eq!(
            derived.invariants().names(),
            vec!["non-negative balance", "balance above minimum"]
        );
        assert_eq!(base.invariants().len(), 1);

        let acct = derived
            .create(json!({"id": "a", "iban": "X", "balance": 100, "minimum": 10}))
            .unwrap();
        assert_eq!(acct.method_names(), vec!["raiseMinimum", "withdraw"]);
    }

    #[test]
    fn inherited_methods_run_against_derived_invariants() {
        let derived = savings(&account());
        let acct = derived
            .create(json!({"id": "a", "iban": "X", "balance": 100, "minimum": 50}))
            .unwrap();

        let err = acct.call("withdraw", json!({"amount": 60})).unwrap_err();
        assert_eq!(err.invariant_name(), Some("balance above minimum"));

        let err = acct.call("withdraw", json!({"amount": 200})).unwrap_err();
        assert_eq!(err.invariant_name(), Some("non-negative balance"));

        let ok = acct.call("withdraw", json!({"amount": 50})).unwrap();
        assert_eq!(ok.data().i64("minimum"), Some(50));
    }

    #[test]
    fn base_schema_is_unaffected() {
        let base = account();
        let _derived = savings(&base);
        let plain = base.create(json!({"id": "a", "iban": "X", "balance": 1, "minimum": 5})).unwrap();
        assert!(!plain.data().contains("minimum"));
        assert!(!plain.has_method("raiseMinimum"));
    }

    #[test]
    fn identity_override_only_affects_the_derived_factory() {
        let base = account();
        let by_iban = base
            .extend(ExtendOptions::new("AccountByIban").identity("iban").inherit_methods())
            .unwrap();

        let a = by_iban.create(json!({"id": "1", "iban": "DE00", "balance": 0})).unwrap();
        let b = by_iban.create(json!({"id": "2", "iban": "DE00", "balance": 0})).unwrap();
        assert_eq!(a, b);

        let c = base.create(json!({"id": "1", "iban": "DE00", "balance": 0})).unwrap();
        let d = base.create(json!({"id": "2", "iban": "DE00", "balance": 0})).unwrap();
        assert_ne!(c, d);
        assert_eq!(base.identity(), "id");
    }

    #[test]
    fn historize_defaults_to_parent_and_can_be_overridden() {
        let base = account();
        assert!(!base.extend(ExtendOptions::new("A").inherit_methods()).unwrap().historize());
        assert!(base
            .extend(ExtendOptions::new("B").inherit_methods().historize(true))
            .unwrap()
            .historize());
    }

    #[test]
    fn historized_parent_can_derive_a_factory_without_history() {
        let audited = account()
            .extend(ExtendOptions::new("AuditedAccount").inherit_methods().historize(true))
            .unwrap();
        let plain = audited
            .extend(ExtendOptions::new("PlainAccount").inherit_methods().historize(false))
            .unwrap();
        assert!(!plain.historize());

        let acct = plain.create(json!({"id": "a", "iban": "X", "balance": 10})).unwrap();
        let acct = acct.call("withdraw", json!({"amount": 3})).unwrap();
        assert_eq!(acct.history(), None);

        let tracked = audited.create(json!({"id": "a", "iban": "X", "balance": 10})).unwrap();
        let tracked = tracked.call("withdraw", json!({"amount": 3})).unwrap();
        assert_eq!(tracked.history().map(<[_]>::len), Some(1));
    }

    #[test]
    fn extend_requires_methods_and_unique_invariant_names() {
        let base = account();
        assert!(matches!(
            base.extend(ExtendOptions::new("NoMethods")),
            Err(DomainError::Configuration(_))
        ));
        assert!(matches!(
            base.extend(
                ExtendOptions::new("Dup")
                    .inherit_methods()
                    .invariant(Invariant::new("non-negative balance", |_: &Record| true))
            ),
            Err(DomainError::Configuration(_))
        ));
    }
}
