//! Storage of one routine execution.

use crate::error::{Result, VmError};
use crate::value::Value;
use indexmap::IndexMap;
use tensile_model::{ModellingHypothesis, VariableType};
use tensile_rk::ir::{IntegrationRoutine, Slot};

/// Named values of a routine: every slot, plus the routine locals once
/// they are declared.
#[derive(Debug, Clone)]
pub struct Frame {
    hypothesis: ModellingHypothesis,
    values: IndexMap<String, Value>,
    /// Components of one element, for array slots
    element_sizes: IndexMap<String, usize>,
}

fn initial_value(slot: &Slot) -> Value {
    let mut value = Value::zeros(slot.len(), slot.var_type == VariableType::StiffnessTensor);
    if let Some(defaults) = &slot.default_value {
        for (component, default) in value.components_mut().iter_mut().zip(defaults) {
            *component = *default;
        }
    }
    value
}

impl Frame {
    /// Zero-initialised frame for `routine`; constants take their defaults.
    pub fn new(routine: &IntegrationRoutine) -> Self {
        let mut values = IndexMap::new();
        let mut element_sizes = IndexMap::new();
        for slot in &routine.slots {
            values.insert(slot.name.clone(), initial_value(slot));
            if slot.array_size > 1 {
                element_sizes.insert(slot.name.clone(), slot.element_size);
            }
        }
        Self {
            hypothesis: routine.hypothesis,
            values,
            element_sizes,
        }
    }

    pub fn hypothesis(&self) -> ModellingHypothesis {
        self.hypothesis
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Components of `name`.
    pub fn components(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Value::components)
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        self.lookup(name)?.as_scalar()
    }

    fn lookup(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| VmError::UnknownName(name.to_string()))
    }

    /// Sets every component of `name`.
    pub fn set(&mut self, name: &str, components: &[f64]) -> Result<()> {
        let value = self
            .values
            .get_mut(name)
            .ok_or_else(|| VmError::UnknownName(name.to_string()))?;
        let target = value.components_mut();
        if target.len() != components.len() {
            return Err(VmError::WrongLength {
                name: name.to_string(),
                expected: target.len(),
                actual: components.len(),
            });
        }
        target.copy_from_slice(components);
        Ok(())
    }

    pub fn set_scalar(&mut self, name: &str, value: f64) -> Result<()> {
        self.set(name, &[value])
    }

    /// Declares a routine local, replacing any previous value.
    pub fn declare(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Stores `value` into the existing storage of `name`, which keeps its
    /// shape.
    pub fn store(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| VmError::UnknownName(name.to_string()))?;
        let compatible = match (&*slot, &value) {
            (Value::Bool(_), Value::Bool(_)) => true,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
            (current, new) => current.components().len() == new.components().len(),
        };
        if !compatible {
            return Err(VmError::ShapeMismatch {
                operation: format!("assignment to {}", name),
                left: slot.kind(),
                right: value.kind(),
            });
        }
        match slot {
            Value::Bool(_) => *slot = value,
            _ => slot.components_mut().copy_from_slice(value.components()),
        }
        Ok(())
    }

    /// `name[index]`: an element of an array slot, or a component of a
    /// single tensor.
    pub fn element(&self, name: &str, index: usize) -> Result<Value> {
        let value = self.lookup(name)?;
        let out_of_range = || VmError::IndexOutOfRange {
            name: name.to_string(),
            index,
        };
        match self.element_sizes.get(name) {
            Some(&size) if size > 1 => {
                let components = value
                    .components()
                    .get(index * size..(index + 1) * size)
                    .ok_or_else(out_of_range)?;
                Ok(Value::Vector(components.to_vec()))
            }
            _ => value
                .components()
                .get(index)
                .map(|component| Value::Scalar(*component))
                .ok_or_else(out_of_range),
        }
    }

    /// Writes `name[index]`.
    pub fn store_element(&mut self, name: &str, index: usize, element: Value) -> Result<()> {
        let size = self.element_sizes.get(name).copied().unwrap_or(1);
        let value = self
            .values
            .get_mut(name)
            .ok_or_else(|| VmError::UnknownName(name.to_string()))?;
        if element.components().len() != size {
            return Err(VmError::WrongLength {
                name: format!("{}[{}]", name, index),
                expected: size,
                actual: element.components().len(),
            });
        }
        let target = value
            .components_mut()
            .get_mut(index * size..(index + 1) * size)
            .ok_or_else(|| VmError::IndexOutOfRange {
                name: name.to_string(),
                index,
            })?;
        target.copy_from_slice(element.components());
        Ok(())
    }

    /// Names and values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
