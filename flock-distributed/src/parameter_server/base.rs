use crate::{FlockDistributedError, ParamValue, ParameterStore, Parameters};
use anyhow::Result;
use log::trace;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

/// Holds the parameters shared by the learner and the executors.
///
/// Every parameter lives behind its own lock, so that concurrent requests on different
/// parameters do not block each other. The set of names is fixed at construction.
pub struct ParameterServer {
    parameters: BTreeMap<String, Mutex<ParamValue>>,
}

impl ParameterServer {
    /// Creates a server holding the initial values of all parameters.
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters: parameters
                .into_iter()
                .map(|(k, v)| (k, Mutex::new(v)))
                .collect(),
        }
    }

    /// Names of the parameters.
    pub fn names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    /// Returns `true` if the server holds a parameter named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    fn lock(&self, name: &str) -> Result<MutexGuard<'_, ParamValue>> {
        let entry = self
            .parameters
            .get(name)
            .ok_or_else(|| FlockDistributedError::UnknownParameter(name.to_string()))?;
        Ok(entry
            .lock()
            .map_err(|_| FlockDistributedError::Poisoned(name.to_string()))?)
    }
}

impl ParameterStore for ParameterServer {
    fn get_parameters(&self, names: &[String]) -> Result<Parameters> {
        let mut values = Parameters::new();
        for name in names.iter() {
            let value = self.lock(name)?.clone();
            values.insert(name.clone(), value);
        }
        Ok(values)
    }

    fn set_parameters(&self, values: Parameters) -> Result<()> {
        if let Some(name) = values.keys().find(|k| !self.contains(k)) {
            return Err(FlockDistributedError::UnknownParameter(name.clone()).into());
        }
        for (name, value) in values.into_iter() {
            trace!("Set parameter {}", name);
            *self.lock(&name)? = value;
        }
        Ok(())
    }

    fn add_to_parameters(&self, deltas: Parameters) -> Result<()> {
        if let Some(name) = deltas.keys().find(|k| !self.contains(k)) {
            return Err(FlockDistributedError::UnknownParameter(name.clone()).into());
        }
        for (name, delta) in deltas.iter() {
            let mut guard = self.lock(name)?;
            // The stored value is left untouched when any member fails.
            let mut value = guard.clone();
            value.add_assign(name, delta)?;
            *guard = value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flock_core::{DType, Tensor};
    use std::{sync::Arc, thread};

    fn server() -> ParameterServer {
        let mut parameters = Parameters::new();
        parameters.insert("executor_steps".to_string(), 0i64.into());
        parameters.insert(
            "policy".to_string(),
            ParamValue::group(vec![("weights", Tensor::zeros(&[2], DType::F32))]),
        );
        parameters.insert("checkpoint".to_string(), ParamValue::opaque(7usize));
        ParameterServer::new(parameters)
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_set() -> Result<()> {
        let server = server();
        assert_eq!(server.names(), names(&["checkpoint", "executor_steps", "policy"]));

        let mut values = Parameters::new();
        values.insert("executor_steps".to_string(), 5i64.into());
        server.set_parameters(values)?;
        let got = server.get_parameters(&names(&["executor_steps"]))?;
        assert_eq!(got.len(), 1);
        assert_eq!(got["executor_steps"].item(), Some(5.));

        let err = server.get_parameters(&names(&["missing"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlockDistributedError>(),
            Some(&FlockDistributedError::UnknownParameter("missing".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_add_to_parameters() -> Result<()> {
        let server = server();
        let mut deltas = Parameters::new();
        deltas.insert("executor_steps".to_string(), 3i64.into());
        deltas.insert(
            "policy".to_string(),
            ParamValue::group(vec![("weights", Tensor::from(vec![1f32, 2.]))]),
        );
        server.add_to_parameters(deltas)?;

        let got = server.get_parameters(&names(&["executor_steps", "policy"]))?;
        assert_eq!(got["executor_steps"].item(), Some(3.));
        let weights = got["policy"].as_group().unwrap()["weights"].as_leaf().unwrap();
        assert_eq!(weights.to_vec(), vec![1., 2.]);

        let mut deltas = Parameters::new();
        deltas.insert("checkpoint".to_string(), 1i64.into());
        assert!(server.add_to_parameters(deltas).is_err());
        Ok(())
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() -> Result<()> {
        let server = Arc::new(server());
        let handles = (0..4)
            .map(|_| {
                let server = server.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut deltas = Parameters::new();
                        deltas.insert("executor_steps".to_string(), 1i64.into());
                        server.add_to_parameters(deltas).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        let got = server.get_parameters(&names(&["executor_steps"]))?;
        assert_eq!(got["executor_steps"].item(), Some(400.));
        Ok(())
    }
}
