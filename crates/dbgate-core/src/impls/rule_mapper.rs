//! RuleMapper - (source type, destination type) ごとのルール表
//!
//! # 学習ポイント
//! - `(TypeId, TypeId)` をキーにした型消去ルール表
//! - 起動時に一度だけ構築し、以後は `Arc` で読み取り専用に共有
//! - 未登録ルールは panic ではなく `MappingError::MissingRule`

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

use crate::error::MappingError;
use crate::ports::MappingEngine;

type NewRule<S, D> = Box<dyn Fn(&S) -> Result<Option<D>, MappingError> + Send + Sync>;
type MergeRule<S, D> = Box<dyn Fn(&S, &mut D) -> Result<(), MappingError> + Send + Sync>;

type RuleKey = (TypeId, TypeId);

fn rule_key<S: 'static, D: 'static>() -> RuleKey {
    (TypeId::of::<S>(), TypeId::of::<D>())
}

fn missing<S, D>() -> MappingError {
    MappingError::MissingRule {
        source_type: type_name::<S>(),
        target_type: type_name::<D>(),
    }
}

/// Mapping engine backed by explicitly registered closures.
///
/// # 使用例
/// ```ignore
/// let mapper = RuleMapper::builder()
///     .rule(|input: &CreateCustomer| Customer::new(&input.name, input.age))
///     .merge(|input: &RenameCustomer, c: &mut Customer| c.name = input.name.clone())
///     .build();
/// ```
#[derive(Default)]
pub struct RuleMapper {
    /// (S, D) -> NewRule<S, D>
    new_rules: HashMap<RuleKey, Box<dyn Any + Send + Sync>>,

    /// (S, D) -> MergeRule<S, D>
    merge_rules: HashMap<RuleKey, Box<dyn Any + Send + Sync>>,

    names: Vec<(&'static str, &'static str)>,
}

impl RuleMapper {
    pub fn builder() -> RuleMapperBuilder {
        RuleMapperBuilder::default()
    }

    /// Registered (source, destination) pairs, in registration order.
    pub fn rules(&self) -> &[(&'static str, &'static str)] {
        &self.names
    }

    pub fn has_rule<S: 'static, D: 'static>(&self) -> bool {
        self.new_rules.contains_key(&rule_key::<S, D>())
    }

    pub fn has_merge<S: 'static, D: 'static>(&self) -> bool {
        self.merge_rules.contains_key(&rule_key::<S, D>())
    }
}

impl fmt::Debug for RuleMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleMapper").field("rules", &self.names).finish()
    }
}

impl MappingEngine for RuleMapper {
    fn map<S: 'static, D: 'static>(&self, source: &S) -> Result<Option<D>, MappingError> {
        let rule = self
            .new_rules
            .get(&rule_key::<S, D>())
            .and_then(|r| r.downcast_ref::<NewRule<S, D>>())
            .ok_or_else(missing::<S, D>)?;
        rule(source)
    }

    fn map_onto<S: 'static, D: 'static>(
        &self,
        source: &S,
        destination: &mut D,
    ) -> Result<(), MappingError> {
        let rule = self
            .merge_rules
            .get(&rule_key::<S, D>())
            .and_then(|r| r.downcast_ref::<MergeRule<S, D>>())
            .ok_or_else(missing::<S, D>)?;
        rule(source, destination)
    }
}

/// Collects rules, then freezes them into a [`RuleMapper`].
///
/// Registering the same (source, destination) pair twice keeps the last rule.
#[derive(Default)]
pub struct RuleMapperBuilder {
    mapper: RuleMapper,
}

impl RuleMapperBuilder {
    /// Infallible rule producing a new `D`.
    pub fn rule<S, D, F>(self, rule: F) -> Self
    where
        S: 'static,
        D: 'static,
        F: Fn(&S) -> D + Send + Sync + 'static,
    {
        self.try_rule(move |source: &S| Ok(Some(rule(source))))
    }

    /// Rule that may fail or produce nothing.
    pub fn try_rule<S, D, F>(mut self, rule: F) -> Self
    where
        S: 'static,
        D: 'static,
        F: Fn(&S) -> Result<Option<D>, MappingError> + Send + Sync + 'static,
    {
        let boxed: NewRule<S, D> = Box::new(rule);
        self.mapper
            .new_rules
            .insert(rule_key::<S, D>(), Box::new(boxed));
        self.record::<S, D>();
        self
    }

    /// Infallible rule writing into an existing `D`.
    pub fn merge<S, D, F>(self, rule: F) -> Self
    where
        S: 'static,
        D: 'static,
        F: Fn(&S, &mut D) + Send + Sync + 'static,
    {
        self.try_merge(move |source: &S, destination: &mut D| {
            rule(source, destination);
            Ok(())
        })
    }

    pub fn try_merge<S, D, F>(mut self, rule: F) -> Self
    where
        S: 'static,
        D: 'static,
        F: Fn(&S, &mut D) -> Result<(), MappingError> + Send + Sync + 'static,
    {
        let boxed: MergeRule<S, D> = Box::new(rule);
        self.mapper
            .merge_rules
            .insert(rule_key::<S, D>(), Box::new(boxed));
        self.record::<S, D>();
        self
    }

    fn record<S, D>(&mut self) {
        let pair = (type_name::<S>(), type_name::<D>());
        if !self.mapper.names.contains(&pair) {
            self.mapper.names.push(pair);
        }
    }

    pub fn build(self) -> RuleMapper {
        tracing::debug!(rules = self.mapper.names.len(), "mapping rules built");
        self.mapper
    }
}
