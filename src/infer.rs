//! The unifier: fresh variable allocation, unification, and concretion.
//!
//! One `InferenceContext` is owned exclusively by the check of a single
//! top-level statement (see the concurrency notes in the crate root docs).
//! The binding forest is a simple append-only `Vec`, chased with path
//! compression on every `shallow_resolve`.

use std::collections::HashMap;

use crate::error::Error;
use crate::ty::{BaseType, ConcreteColumnType, InferredType, VarId};

#[derive(Debug, Default)]
pub struct InferenceContext {
    bindings: Vec<Option<InferredType>>,
    named_variables: HashMap<String, VarId>,
}

impl InferenceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, unbound variable.
    pub fn anonymous_variable(&mut self) -> InferredType {
        let id = self.bindings.len();
        self.bindings.push(None);
        InferredType::Variable(id)
    }

    /// Return the variable keyed by a bind-parameter name, allocating one on
    /// first sight. The same name always yields the same variable for the
    /// lifetime of this context.
    pub fn variable(&mut self, bind_parameter: &str) -> InferredType {
        if let Some(&id) = self.named_variables.get(bind_parameter) {
            return InferredType::Variable(id);
        }
        let var = self.anonymous_variable();
        if let InferredType::Variable(id) = var {
            self.named_variables.insert(bind_parameter.to_string(), id);
        }
        var
    }

    /// Follow a variable's binding chain to its current value, compressing
    /// the chain as it goes. Non-variable types are returned unchanged;
    /// `Dependent`/`OneOf` are left symbolic so unification can still refine
    /// them further.
    fn shallow_resolve(&mut self, ty: InferredType) -> InferredType {
        match ty {
            InferredType::Variable(v) => match self.bindings[v].clone() {
                Some(bound) => {
                    let resolved = self.shallow_resolve(bound);
                    self.bindings[v] = Some(resolved.clone());
                    resolved
                }
                None => InferredType::Variable(v),
            },
            other => other,
        }
    }

    /// The base type of a type if it is already known without creating new
    /// bindings; `None` for variables/`OneOf` whose base is not yet pinned
    /// down to a single possibility.
    fn known_base(&self, ty: &InferredType) -> Option<BaseType> {
        match ty {
            InferredType::Concrete(c) => Some(c.base),
            InferredType::OneOf(s) if s.len() == 1 => Some(s[0].base),
            _ => None,
        }
    }

    fn conflict(&mut self, a: &InferredType, b: &InferredType) -> Error {
        Error::TypeMismatch {
            expected: self.concrete(a),
            got: self.concrete(b),
        }
    }

    /// Compute the most general type refining both `a` and `b`, or an error
    /// on conflict. See the module-level rules in the crate's expanded spec.
    pub fn unify(&mut self, a: InferredType, b: InferredType) -> Result<InferredType, Error> {
        let a = self.shallow_resolve(a);
        let b = self.shallow_resolve(b);

        match (&a, &b) {
            (InferredType::Variable(v1), InferredType::Variable(v2)) if v1 == v2 => Ok(a),
            (InferredType::Variable(v), _) => {
                self.bindings[*v] = Some(b);
                Ok(InferredType::Variable(*v))
            }
            (_, InferredType::Variable(v)) => {
                self.bindings[*v] = Some(a);
                Ok(InferredType::Variable(*v))
            }
            (InferredType::Dependent(parent, base), _) => {
                self.unify_dependent((**parent).clone(), *base, b)
            }
            (_, InferredType::Dependent(parent, base)) => {
                self.unify_dependent((**parent).clone(), *base, a)
            }
            (InferredType::OneOf(_), _) | (_, InferredType::OneOf(_)) => self.unify_one_of(a, b),
            (InferredType::Concrete(c1), InferredType::Concrete(c2)) => c1
                .meet(*c2)
                .map(InferredType::Concrete)
                .ok_or_else(|| Error::TypeMismatch {
                    expected: *c1,
                    got: *c2,
                }),
        }
    }

    fn unify_dependent(
        &mut self,
        parent: InferredType,
        base: BaseType,
        other: InferredType,
    ) -> Result<InferredType, Error> {
        let propagated = self.unify(parent, other.clone())?;
        match self.known_base(&other) {
            Some(other_base) => {
                let merged_base = base.meet(other_base).ok_or_else(|| Error::TypeMismatch {
                    expected: ConcreteColumnType::non_null(base),
                    got: ConcreteColumnType::non_null(other_base),
                })?;
                let nullable = self.concrete(&propagated).nullable;
                Ok(InferredType::Concrete(ConcreteColumnType::new(
                    merged_base,
                    nullable,
                )))
            }
            None => Ok(InferredType::dependent(propagated, base)),
        }
    }

    fn unify_one_of(&mut self, a: InferredType, b: InferredType) -> Result<InferredType, Error> {
        let candidates = |ty: &InferredType| -> Vec<ConcreteColumnType> {
            match ty {
                InferredType::OneOf(s) => s.clone(),
                InferredType::Concrete(c) => vec![*c],
                _ => Vec::new(),
            }
        };

        let lhs = candidates(&a);
        let rhs = candidates(&b);

        let merged: Vec<ConcreteColumnType> = if lhs.is_empty() {
            rhs.clone()
        } else if rhs.is_empty() {
            lhs.clone()
        } else {
            let mut out = Vec::new();
            for l in &lhs {
                for r in &rhs {
                    if let Some(m) = l.meet(*r) {
                        if !out.contains(&m) {
                            out.push(m);
                        }
                    }
                }
            }
            out
        };

        match merged.len() {
            0 => Err(self.conflict(&a, &b)),
            1 => Ok(InferredType::Concrete(merged[0])),
            _ => Ok(InferredType::OneOf(merged)),
        }
    }

    /// Shorthand for `unify(inferred, Dependent(inferred, base_type))`:
    /// imposes a base-type constraint without changing nullability.
    ///
    /// When `inferred` resolves to an unbound variable, building
    /// `Dependent(Variable(v), base)` and unifying it against that same
    /// variable would bind `v` to a type that names `v` itself, looping
    /// forever the next time anything resolves `v`. Bind the variable
    /// directly to the base constraint instead.
    pub fn unify_base(
        &mut self,
        inferred: InferredType,
        base: BaseType,
    ) -> Result<InferredType, Error> {
        let resolved = self.shallow_resolve(inferred.clone());
        if let InferredType::Variable(v) = resolved {
            self.bindings[v] = Some(InferredType::OneOf(vec![
                ConcreteColumnType::non_null(base),
                ConcreteColumnType::nullable(base),
            ]));
            return Ok(InferredType::Variable(v));
        }
        let dependent = InferredType::dependent(inferred.clone(), base);
        self.unify(inferred, dependent)
    }

    /// Left fold of `unify` over an iterator, seeded with `Any`. Returns the
    /// first error encountered.
    pub fn unify_all(
        &mut self,
        items: impl IntoIterator<Item = InferredType>,
    ) -> Result<InferredType, Error> {
        let mut acc = InferredType::any();
        for item in items {
            acc = self.unify(acc, item)?;
        }
        Ok(acc)
    }

    /// Resolve variables by transitive lookup and pick a default for
    /// anything still unconstrained: unbound variables default to nullable
    /// `Any`; `OneOf` defaults to its first listed concrete.
    pub fn concrete(&mut self, inferred: &InferredType) -> ConcreteColumnType {
        match self.shallow_resolve(inferred.clone()) {
            InferredType::Concrete(c) => c,
            InferredType::Variable(_) => ConcreteColumnType::nullable(BaseType::Any),
            InferredType::Dependent(parent, base) => {
                ConcreteColumnType::new(base, self.concrete(&parent).nullable)
            }
            InferredType::OneOf(s) => s.first().copied().unwrap_or(ConcreteColumnType::nullable(BaseType::Any)),
        }
    }
}
