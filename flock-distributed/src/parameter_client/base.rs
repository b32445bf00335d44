use super::ParameterClientConfig;
use crate::{FlockDistributedError, ParamValue, ParameterStore, Parameters};
use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use log::{debug, warn};
use std::{mem, thread};

/// Executor-side cache of parameters held by a [`ParameterStore`].
///
/// The client fetches `get_keys` from the store and pushes `set_keys` to it, never
/// the other way around, so values owned by the learner and values owned by the
/// executor do not overwrite each other. The periodic hooks
/// ([`get_async()`](Self::get_async), [`set_async()`](Self::set_async)) synchronize
/// once every `update_period` calls on a background thread; the cache may therefore be
/// stale by up to one period plus one round trip.
pub struct ParameterClient<S: ParameterStore> {
    store: S,
    parameters: Parameters,
    get_keys: Vec<String>,
    set_keys: Vec<String>,
    update_period: usize,
    get_call_counter: usize,
    set_call_counter: usize,
    get_request: Option<Receiver<Result<Parameters>>>,
    set_request: Option<Receiver<Result<()>>>,
    add_request: Option<Receiver<Result<()>>>,

    /// Deltas given to [`add_async()`](Self::add_async) while an add is in flight.
    add_buffer: Parameters,
}

impl<S> ParameterClient<S>
where
    S: ParameterStore + Clone + Send + 'static,
{
    /// Creates a client with the initial contents of its cache.
    pub fn build(store: S, parameters: Parameters, config: &ParameterClientConfig) -> Result<Self> {
        if config.update_period < 1 {
            return Err(FlockDistributedError::InvalidUpdatePeriod(config.update_period).into());
        }
        let overlap = config
            .get_keys
            .iter()
            .filter(|k| config.set_keys.contains(k))
            .cloned()
            .collect::<Vec<_>>();
        if !overlap.is_empty() {
            return Err(FlockDistributedError::OverlappingKeys(overlap).into());
        }

        Ok(Self {
            store,
            parameters,
            get_keys: config.get_keys.clone(),
            set_keys: config.set_keys.clone(),
            update_period: config.update_period,
            get_call_counter: 0,
            set_call_counter: 0,
            get_request: None,
            set_request: None,
            add_request: None,
            add_buffer: Parameters::new(),
        })
    }

    /// Cached parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Cached parameters, for updating the values pushed with `set_keys`.
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Parameters fetched from the store.
    pub fn get_keys(&self) -> &[String] {
        &self.get_keys
    }

    /// Parameters pushed to the store.
    pub fn set_keys(&self) -> &[String] {
        &self.set_keys
    }

    /// Number of calls of the periodic hooks between two synchronizations.
    pub fn update_period(&self) -> usize {
        self.update_period
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches `get_keys` from the store and merges them into the cache.
    pub fn get_and_wait(&mut self) -> Result<()> {
        let parameters = self.store.get_parameters(&self.get_keys)?;
        self.merge_parameters(parameters)
    }

    /// Fetches every parameter held by the cache.
    pub fn get_all_and_wait(&mut self) -> Result<()> {
        let names = self.parameters.keys().cloned().collect::<Vec<_>>();
        let parameters = self.store.get_parameters(&names)?;
        self.merge_parameters(parameters)
    }

    /// Pushes the cached values of `set_keys` to the store.
    pub fn set_and_wait(&mut self) -> Result<()> {
        let values = self.set_values()?;
        self.store.set_parameters(values)
    }

    /// Adds `deltas` to the parameters in the store. The cache is left untouched.
    pub fn add_and_wait(&mut self, deltas: Parameters) -> Result<()> {
        self.store.add_to_parameters(deltas)
    }

    /// Merges fetched values into the cache.
    ///
    /// Members of a group replace the members of the cached group with the same
    /// names. A leaf is assigned in place into the cached leaf, keeping the shape and
    /// element type of the cache, whenever it broadcasts into the cached shape after
    /// dropping leading axes of length 1; otherwise it replaces the cached leaf. Opaque values
    /// are rejected with [`FlockDistributedError::UnsupportedParameterType`], in which
    /// case nothing is merged.
    pub fn merge_parameters(&mut self, new_parameters: Parameters) -> Result<()> {
        if let Some((name, value)) = new_parameters
            .iter()
            .find(|(_, v)| matches!(v, ParamValue::Opaque(_)))
        {
            return Err(FlockDistributedError::UnsupportedParameterType {
                name: name.clone(),
                kind: value.kind(),
            }
            .into());
        }

        for (name, value) in new_parameters.into_iter() {
            match value {
                ParamValue::Group(new_group) => {
                    if let Some(ParamValue::Group(group)) = self.parameters.get_mut(&name) {
                        group.extend(new_group);
                        continue;
                    }
                    self.parameters.insert(name, ParamValue::Group(new_group));
                }
                ParamValue::Leaf(new_leaf) => {
                    if let Some(ParamValue::Leaf(leaf)) = self.parameters.get_mut(&name) {
                        let squeezed = new_leaf.squeeze_leading(leaf.shape().len());
                        if squeezed.broadcasts_to(leaf.shape()) {
                            leaf.assign(&squeezed)?;
                            continue;
                        }
                    }
                    self.parameters.insert(name, ParamValue::Leaf(new_leaf));
                }
                ParamValue::Opaque(_) => {
                    return Err(FlockDistributedError::UnsupportedParameterType {
                        name,
                        kind: "opaque",
                    }
                    .into())
                }
            }
        }
        Ok(())
    }

    /// Periodic fetch of `get_keys`.
    ///
    /// Every `update_period`-th call launches a fetch on a background thread unless one
    /// is still in flight. Results of completed fetches are merged into the cache. Returns
    /// `true` if the cache was updated during this call.
    pub fn get_async(&mut self) -> Result<bool> {
        self.get_call_counter += 1;
        if self.get_call_counter >= self.update_period && self.get_request.is_none() {
            self.get_call_counter = 0;
            let names = self.get_keys.clone();
            self.get_request = Some(self.request("get", move |store: &S| {
                store.get_parameters(&names)
            })?);
        }
        self.adjust_and_request()
    }

    /// Periodic push of `set_keys`.
    ///
    /// The values are copied from the cache at the time the push is launched.
    pub fn set_async(&mut self) -> Result<()> {
        self.set_call_counter += 1;
        if self.set_call_counter >= self.update_period && self.set_request.is_none() {
            self.set_call_counter = 0;
            let values = self.set_values()?;
            self.set_request = Some(self.request("set", move |store: &S| {
                store.set_parameters(values)
            })?);
        }
        self.adjust_and_request().map(|_| ())
    }

    /// Adds `deltas` to the store on a background thread.
    ///
    /// While a previous add is in flight, the deltas are accumulated locally and sent
    /// with the next add. If any delta cannot be accumulated, none of them is.
    pub fn add_async(&mut self, deltas: Parameters) -> Result<()> {
        self.adjust_and_request()?;
        let mut buffer = self.add_buffer.clone();
        for (name, delta) in deltas.into_iter() {
            accumulate(&mut buffer, name, delta)?;
        }
        self.add_buffer = buffer;
        if self.add_request.is_none() {
            let deltas = mem::take(&mut self.add_buffer);
            self.add_request = Some(self.request("add", move |store: &S| {
                store.add_to_parameters(deltas)
            })?);
        }
        Ok(())
    }

    /// Blocks until every request in flight has finished, then sends the buffered deltas.
    ///
    /// Returns `true` if a fetch updated the cache.
    pub fn wait_pending(&mut self) -> Result<bool> {
        let mut updated = false;
        if let Some(parameters) = wait(&mut self.get_request, "get")? {
            self.merge_parameters(parameters)?;
            updated = true;
        }
        wait(&mut self.set_request, "set")?;
        wait(&mut self.add_request, "add")?;
        if !self.add_buffer.is_empty() {
            let deltas = mem::take(&mut self.add_buffer);
            self.store.add_to_parameters(deltas)?;
        }
        Ok(updated)
    }

    /// Applies the results of completed requests.
    fn adjust_and_request(&mut self) -> Result<bool> {
        let mut updated = false;
        if let Some(parameters) = poll(&mut self.get_request, "get")? {
            self.merge_parameters(parameters)?;
            debug!("Fetched {} parameters", self.get_keys.len());
            updated = true;
        }
        if poll(&mut self.set_request, "set")?.is_some() {
            debug!("Pushed {} parameters", self.set_keys.len());
        }
        poll(&mut self.add_request, "add")?;
        Ok(updated)
    }

    fn set_values(&self) -> Result<Parameters> {
        let mut values = Parameters::new();
        for name in self.set_keys.iter() {
            let value = self
                .parameters
                .get(name)
                .ok_or_else(|| FlockDistributedError::UnknownParameter(name.clone()))?;
            values.insert(name.clone(), value.clone());
        }
        Ok(values)
    }

    fn request<T, F>(&self, kind: &str, f: F) -> Result<Receiver<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let store = self.store.clone();
        thread::Builder::new()
            .name(format!("parameter-client-{}", kind))
            .spawn(move || {
                let _ = sender.send(f(&store));
            })?;
        Ok(receiver)
    }
}

impl<S: ParameterStore> Drop for ParameterClient<S> {
    fn drop(&mut self) {
        if let Err(e) = wait(&mut self.add_request, "add") {
            warn!("Pending add of parameter client failed: {}", e);
        }
        if !self.add_buffer.is_empty() {
            let n = self.add_buffer.len();
            let deltas = mem::take(&mut self.add_buffer);
            if let Err(e) = self.store.add_to_parameters(deltas) {
                warn!("Parameter client dropped {} buffered deltas: {}", n, e);
            }
        }
    }
}

fn accumulate(buffer: &mut Parameters, name: String, delta: ParamValue) -> Result<()> {
    match buffer.get_mut(&name) {
        Some(value) => value.add_assign(&name, &delta),
        None => {
            buffer.insert(name, delta);
            Ok(())
        }
    }
}

/// Takes the result of a request if it has completed.
fn poll<T>(request: &mut Option<Receiver<Result<T>>>, kind: &'static str) -> Result<Option<T>> {
    let result = match request {
        Some(receiver) => match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Ok(None),
            Err(TryRecvError::Disconnected) => Err(FlockDistributedError::RequestDropped(kind).into()),
        },
        None => return Ok(None),
    };
    *request = None;
    result.map(Some)
}

/// Blocks until a request in flight completes.
fn wait<T>(request: &mut Option<Receiver<Result<T>>>, kind: &'static str) -> Result<Option<T>> {
    match request.take() {
        Some(receiver) => match receiver.recv() {
            Ok(result) => result.map(Some),
            Err(_) => Err(FlockDistributedError::RequestDropped(kind).into()),
        },
        None => Ok(None),
    }
}
