use crate::{ParameterClient, ParameterStore, Policy, SyncModel};
use anyhow::Result;
use flock_core::{AgentMap, NStepTransitionAdder, ReplaySink, Tensor, TimeStep};
use log::debug;

/// Acts in the environment and records the experience of all agents.
///
/// An executor without an adder is an evaluator: it selects actions and keeps its
/// policy in sync, but writes nothing.
pub struct Executor<P, W, S>
where
    W: ReplaySink,
    S: ParameterStore,
{
    policy: P,
    adder: Option<NStepTransitionAdder<W>>,
    parameter_client: Option<ParameterClient<S>>,
}

impl<P, W, S> Executor<P, W, S>
where
    P: Policy + SyncModel,
    W: ReplaySink,
    S: ParameterStore + Clone + Send + 'static,
{
    /// Creates an executor.
    pub fn new(
        policy: P,
        adder: Option<NStepTransitionAdder<W>>,
        parameter_client: Option<ParameterClient<S>>,
    ) -> Self {
        Self {
            policy,
            adder,
            parameter_client,
        }
    }

    /// Returns `true` if the executor does not record experience.
    pub fn is_evaluator(&self) -> bool {
        self.adder.is_none()
    }

    /// The policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The adder, if any.
    pub fn adder(&self) -> Option<&NStepTransitionAdder<W>> {
        self.adder.as_ref()
    }

    /// The parameter client, if any.
    pub fn parameter_client(&self) -> Option<&ParameterClient<S>> {
        self.parameter_client.as_ref()
    }

    /// Mutable reference to the parameter client, if any.
    pub fn parameter_client_mut(&mut self) -> Option<&mut ParameterClient<S>> {
        self.parameter_client.as_mut()
    }

    /// Records the first timestep of an episode.
    pub fn observe_first(&mut self, timestep: &TimeStep) -> Result<()> {
        match &mut self.adder {
            Some(adder) => adder.add_first(timestep, self.policy.extras()),
            None => Ok(()),
        }
    }

    /// Records the actions taken and the timestep they led to.
    pub fn observe(&mut self, actions: &AgentMap<Tensor>, next_timestep: &TimeStep) -> Result<()> {
        match &mut self.adder {
            Some(adder) => adder.add(actions.clone(), next_timestep, self.policy.extras()),
            None => Ok(()),
        }
    }

    /// Writes the remaining transitions of an episode cut short.
    pub fn end_episode(&mut self) -> Result<()> {
        if let Some(adder) = &mut self.adder {
            adder.drain()?;
            adder.reset();
        }
        Ok(())
    }

    /// Selects the actions of all agents.
    pub fn select_actions(&mut self, observations: &AgentMap<Tensor>) -> Result<AgentMap<Tensor>> {
        self.policy.select_actions(observations)
    }

    /// Synchronizes the policy with the parameter store.
    ///
    /// With `wait = true` the parameters are fetched before returning; otherwise the
    /// periodic hook of the client decides whether to fetch.
    pub fn update(&mut self, wait: bool) -> Result<()> {
        if let Some(client) = &mut self.parameter_client {
            let updated = match wait {
                true => {
                    client.get_and_wait()?;
                    true
                }
                false => client.get_async()?,
            };
            if updated {
                debug!("Sync model");
                self.policy.sync_model(client.parameters())?;
            }
        }
        Ok(())
    }

    /// Consumes the executor, returning the adder.
    pub fn into_adder(self) -> Option<NStepTransitionAdder<W>> {
        self.adder
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{ParameterClientConfig, ParameterServer, Parameters};
    use flock_core::{MemoryReplaySink, NStepTransitionAdderConfig};
    use std::sync::Arc;
    use test_log::test;

    /// Takes the same action for every agent; the action is a synced parameter.
    pub(crate) struct ConstantPolicy {
        pub action: f64,
        pub n_syncs: usize,
    }

    impl ConstantPolicy {
        pub fn new() -> Self {
            Self {
                action: 0.,
                n_syncs: 0,
            }
        }
    }

    impl Policy for ConstantPolicy {
        fn select_actions(&mut self, observations: &AgentMap<Tensor>) -> Result<AgentMap<Tensor>> {
            Ok(observations
                .keys()
                .map(|k| (k.clone(), Tensor::from(self.action as f32)))
                .collect())
        }
    }

    impl SyncModel for ConstantPolicy {
        fn sync_model(&mut self, parameters: &Parameters) -> Result<()> {
            if let Some(action) = parameters.get("policy_action").and_then(|p| p.item()) {
                self.action = action;
            }
            self.n_syncs += 1;
            Ok(())
        }
    }

    pub(crate) fn agents(v: f32) -> AgentMap<Tensor> {
        vec![("agent_0", v), ("agent_1", v)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Tensor::from(v)))
            .collect()
    }

    fn server() -> Arc<ParameterServer> {
        let mut parameters = Parameters::new();
        parameters.insert("policy_action".to_string(), 2f32.into());
        Arc::new(ParameterServer::new(parameters))
    }

    fn client(server: Arc<ParameterServer>) -> Result<ParameterClient<Arc<ParameterServer>>> {
        let mut cache = Parameters::new();
        cache.insert("policy_action".to_string(), 0f32.into());
        let config = ParameterClientConfig::default()
            .get_keys(vec!["policy_action"])
            .update_period(1);
        ParameterClient::build(server, cache, &config)
    }

    #[test]
    fn test_executor_records_and_syncs() -> Result<()> {
        let adder = NStepTransitionAdder::build(
            &NStepTransitionAdderConfig::default().n_step(2),
            MemoryReplaySink::new(),
            None,
        )?;
        let mut executor = Executor::new(ConstantPolicy::new(), Some(adder), Some(client(server())?));
        assert!(!executor.is_evaluator());

        executor.update(true)?;
        assert_eq!(executor.policy().action, 2.);
        assert_eq!(executor.policy().n_syncs, 1);

        executor.observe_first(&TimeStep::restart(agents(0.)))?;
        let actions = executor.select_actions(&agents(0.))?;
        assert_eq!(actions["agent_1"].item(), Some(2.));
        executor.observe(&actions, &TimeStep::transition(agents(1.), agents(1.), agents(1.)))?;
        executor.observe(&actions, &TimeStep::termination(agents(2.), agents(1.), agents(0.)))?;

        let sink = executor.into_adder().unwrap().into_sink();
        assert_eq!(sink.num_transitions(), 3);
        Ok(())
    }

    #[test]
    fn test_end_episode_drains() -> Result<()> {
        let adder = NStepTransitionAdder::build(
            &NStepTransitionAdderConfig::default().n_step(3),
            MemoryReplaySink::new(),
            None,
        )?;
        let mut executor: Executor<_, _, Arc<ParameterServer>> =
            Executor::new(ConstantPolicy::new(), Some(adder), None);

        executor.observe_first(&TimeStep::restart(agents(0.)))?;
        let actions = executor.select_actions(&agents(0.))?;
        executor.observe(&actions, &TimeStep::transition(agents(1.), agents(1.), agents(1.)))?;
        executor.observe(&actions, &TimeStep::transition(agents(2.), agents(1.), agents(1.)))?;
        assert_eq!(executor.adder().unwrap().sink().num_transitions(), 2);

        executor.end_episode()?;
        assert_eq!(executor.adder().unwrap().sink().num_transitions(), 3);
        Ok(())
    }

    #[test]
    fn test_evaluator_writes_nothing() -> Result<()> {
        let mut executor: Executor<_, MemoryReplaySink, _> =
            Executor::new(ConstantPolicy::new(), None, Some(client(server())?));
        assert!(executor.is_evaluator());

        executor.observe_first(&TimeStep::restart(agents(0.)))?;
        executor.update(false)?;
        executor.parameter_client_mut().unwrap().wait_pending()?;
        let cached = executor.parameter_client().unwrap().parameters()["policy_action"].item();
        assert_eq!(cached, Some(2.));
        assert!(executor.into_adder().is_none());
        Ok(())
    }
}
