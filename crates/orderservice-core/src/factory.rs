//! Repository factory.
//!
//! Maps a model type to a constructor for its repository through an explicit
//! registry keyed by the model's `TypeId`. [`Model::NAME`] is only used for
//! diagnostics, so two models sharing a name stay distinct. Asking for a
//! model nobody registered fails with [`DomainError::UnknownModel`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DomainError;
use crate::repository::{Model, Repository};

type Constructor<C, M> = Arc<dyn Fn(&C) -> Arc<dyn Repository<M>> + Send + Sync>;

/// Builds repositories for registered models over a shared data context.
pub struct RepositoryFactory<C> {
    context: C,
    constructors: HashMap<TypeId, Registration>,
}

/// A type-erased constructor. The entry stored under `TypeId::of::<M>()`
/// always holds a `Constructor<C, M>`.
struct Registration {
    name: &'static str,
    constructor: Box<dyn Any + Send + Sync>,
}

impl<C: Send + Sync + 'static> RepositoryFactory<C> {
    /// Creates a factory with an empty registry.
    #[must_use]
    pub fn new(context: C) -> Self {
        Self {
            context,
            constructors: HashMap::new(),
        }
    }

    /// Registers the repository constructor for model `M`, replacing any
    /// earlier registration for the same model type.
    #[must_use]
    pub fn register<M, F>(mut self, constructor: F) -> Self
    where
        M: Model,
        F: Fn(&C) -> Arc<dyn Repository<M>> + Send + Sync + 'static,
    {
        let constructor: Constructor<C, M> = Arc::new(constructor);
        self.constructors.insert(
            TypeId::of::<M>(),
            Registration {
                name: M::NAME,
                constructor: Box::new(constructor),
            },
        );
        self
    }

    /// Builds the repository for model `M`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownModel` if `M` was never registered.
    pub fn create<M: Model>(&self) -> Result<Arc<dyn Repository<M>>, DomainError> {
        self.constructors
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.constructor.downcast_ref::<Constructor<C, M>>())
            .map(|constructor| constructor(&self.context))
            .ok_or(DomainError::UnknownModel(M::NAME))
    }

    /// Returns `true` if a repository is registered for `M`.
    #[must_use]
    pub fn is_registered<M: Model>(&self) -> bool {
        self.constructors.contains_key(&TypeId::of::<M>())
    }

    /// The data context handed to every constructor.
    #[must_use]
    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<C> fmt::Debug for RepositoryFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<_> = self.constructors.values().map(|r| r.name).collect();
        models.sort();
        f.debug_struct("RepositoryFactory")
            .field("models", &models)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::repository::{Predicate, UpdateOutcome};

    #[derive(Debug, Clone, PartialEq)]
    struct Widget(i32);

    impl Model for Widget {
        const NAME: &'static str = "Widget";
    }

    #[derive(Debug)]
    struct Gadget;

    impl Model for Gadget {
        const NAME: &'static str = "Gadget";
    }

    #[derive(Debug)]
    struct FixedWidgets(i32);

    #[async_trait]
    impl Repository<Widget> for FixedWidgets {
        async fn create(&self, _model: &mut Widget) -> Result<(), DomainError> {
            Ok(())
        }

        async fn read(
            &self,
            _predicate: Option<&Predicate<Widget>>,
        ) -> Result<Vec<Widget>, DomainError> {
            Ok(vec![Widget(self.0)])
        }

        async fn find(&self, _id: i32) -> Result<Option<Widget>, DomainError> {
            Ok(None)
        }

        async fn update(&self, _model: &mut Widget) -> Result<UpdateOutcome, DomainError> {
            Ok(UpdateOutcome::Applied)
        }

        async fn delete(&self, _model: &Widget) -> Result<UpdateOutcome, DomainError> {
            Ok(UpdateOutcome::Applied)
        }
    }

    #[tokio::test]
    async fn test_create_builds_registered_repository_from_context() {
        let factory = RepositoryFactory::new(11_i32)
            .register::<Widget, _>(|ctx: &i32| Arc::new(FixedWidgets(*ctx)));

        let repo = factory.create::<Widget>().unwrap();

        assert_eq!(repo.read(None).await.unwrap(), vec![Widget(11)]);
        assert!(factory.is_registered::<Widget>());
    }

    #[test]
    fn test_create_unknown_model_fails() {
        let factory = RepositoryFactory::new(())
            .register::<Widget, _>(|_: &()| Arc::new(FixedWidgets(0)));

        match factory.create::<Gadget>() {
            Err(DomainError::UnknownModel(name)) => assert_eq!(name, "Gadget"),
            Err(other) => panic!("expected UnknownModel, got {other:?}"),
            Ok(_) => panic!("expected UnknownModel, got a repository"),
        }
        assert!(!factory.is_registered::<Gadget>());
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OtherWidget;

    impl Model for OtherWidget {
        const NAME: &'static str = "Widget";
    }

    #[derive(Debug)]
    struct OtherWidgets;

    #[async_trait]
    impl Repository<OtherWidget> for OtherWidgets {
        async fn create(&self, _model: &mut OtherWidget) -> Result<(), DomainError> {
            Ok(())
        }

        async fn read(
            &self,
            _predicate: Option<&Predicate<OtherWidget>>,
        ) -> Result<Vec<OtherWidget>, DomainError> {
            Ok(vec![OtherWidget])
        }

        async fn find(&self, _id: i32) -> Result<Option<OtherWidget>, DomainError> {
            Ok(None)
        }

        async fn update(&self, _model: &mut OtherWidget) -> Result<UpdateOutcome, DomainError> {
            Ok(UpdateOutcome::Applied)
        }

        async fn delete(&self, _model: &OtherWidget) -> Result<UpdateOutcome, DomainError> {
            Ok(UpdateOutcome::Applied)
        }
    }

    #[tokio::test]
    async fn test_models_sharing_a_name_resolve_independently() {
        let factory = RepositoryFactory::new(5_i32)
            .register::<Widget, _>(|ctx: &i32| Arc::new(FixedWidgets(*ctx)))
            .register::<OtherWidget, _>(|_: &i32| Arc::new(OtherWidgets));

        let widgets = factory.create::<Widget>().unwrap();
        let others = factory.create::<OtherWidget>().unwrap();

        assert_eq!(widgets.read(None).await.unwrap(), vec![Widget(5)]);
        assert_eq!(others.read(None).await.unwrap(), vec![OtherWidget]);
    }

    #[test]
    fn test_debug_lists_registered_models() {
        let factory = RepositoryFactory::new(())
            .register::<Widget, _>(|_: &()| Arc::new(FixedWidgets(0)));

        assert!(format!("{factory:?}").contains("Widget"));
    }
}
