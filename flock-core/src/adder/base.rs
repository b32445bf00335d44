//! N-step transition adder.
use super::{
    calculate_priorities, default_priority_fns, NStepTransitionAdderConfig, PriorityFnMapping,
    StepBuffer,
};
use crate::{
    error::FlockError, tensor::broadcast_shape, AgentMap, Extras, ReplaySink, Step, Tensor,
    TimeStep, Transition,
};
use anyhow::Result;
use log::{debug, trace};

/// Collapses sequences of up to N steps into N-step transitions.
///
/// For N=1 the transitions are `(s_t, a_t, r_t, d_t, s_{t+1}, e_t)`. For larger N:
///
/// ```text
/// R_{t:t+n} = r_t + g * d_t * r_{t+1} + ... + g^{n-1} * d_t * ... * d_{t+n-2} * r_{t+n-1}
/// D_{t:t+n} = g^{n-1} * d_t * ... * d_{t+n-1}
/// ```
///
/// where `g` is the discount of the adder and `d_i` the environment discounts.
///
/// At the beginning of an episode shorter transitions are written,
/// `(s_0 -> s_1), (s_0 -> s_2), ..., (s_0 -> s_n), (s_1 -> s_{n+1})`,
/// and at the end of an episode the buffer is drained,
/// `(s_{T-n+1} -> s_T), ..., (s_{T-1} -> s_T)`.
/// Extras are taken from the first step of each window.
pub struct NStepTransitionAdder<W: ReplaySink> {
    sink: W,
    buffer: StepBuffer,

    /// Accumulator discount as a single precision scalar, so that it is promoted by
    /// double precision rewards and discounts and left alone otherwise.
    discount: Tensor,

    priority_fns: PriorityFnMapping,

    /// Template of the synthetic final step given to the priority functions.
    /// Only its observations change between writes.
    final_step_placeholder: Option<Step>,

    next_observations: Option<AgentMap<Tensor>>,
    next_extras: Extras,
    start_of_episode: bool,
}

impl<W: ReplaySink> NStepTransitionAdder<W> {
    /// Builds an adder writing into `sink`.
    ///
    /// With `priority_fns = None` every transition gets priority 1 in
    /// [`DEFAULT_PRIORITY_TABLE`](super::DEFAULT_PRIORITY_TABLE).
    pub fn build(
        config: &NStepTransitionAdderConfig,
        sink: W,
        priority_fns: Option<PriorityFnMapping>,
    ) -> Result<Self> {
        if config.n_step < 1 {
            return Err(FlockError::InvalidNStep(config.n_step).into());
        }
        Ok(Self {
            sink,
            buffer: StepBuffer::new(config.n_step)?,
            discount: Tensor::from(config.discount),
            priority_fns: priority_fns.unwrap_or_else(default_priority_fns),
            final_step_placeholder: None,
            next_observations: None,
            next_extras: Extras::new(),
            start_of_episode: false,
        })
    }

    /// The N-step horizon.
    pub fn n_step(&self) -> usize {
        self.buffer.capacity()
    }

    /// The sink transitions are written to.
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Mutable reference to the sink.
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Consumes the adder, returning the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Starts an episode with its first timestep.
    ///
    /// If the previous episode was interrupted, its buffered steps are drained first.
    pub fn add_first(&mut self, timestep: &TimeStep, extras: Extras) -> Result<()> {
        if !timestep.first() {
            return Err(FlockError::NotFirstTimeStep(timestep.step_type.to_string()).into());
        }
        if !self.buffer.is_empty() {
            debug!("Drain {} steps of an interrupted episode", self.buffer.len());
            self.drain()?;
        }
        self.reset();
        self.next_observations = Some(timestep.observations.clone());
        self.next_extras = extras;
        self.start_of_episode = true;
        Ok(())
    }

    /// Records the actions taken and the timestep they led to, writing a transition.
    ///
    /// If `next_timestep` is the last one of the episode, the buffer is drained and the
    /// adder is reset.
    pub fn add(
        &mut self,
        actions: AgentMap<Tensor>,
        next_timestep: &TimeStep,
        next_extras: Extras,
    ) -> Result<()> {
        let observations = match &self.next_observations {
            Some(observations) => observations.clone(),
            None => return Err(FlockError::AddFirstRequired.into()),
        };
        let step = Step {
            observations,
            actions,
            rewards: next_timestep.rewards.clone(),
            discounts: next_timestep.discounts.clone(),
            start_of_episode: self.start_of_episode,
            extras: std::mem::replace(&mut self.next_extras, next_extras),
        };
        if let Err(e) = step.validate() {
            self.next_extras = step.extras;
            return Err(e);
        }

        // The oldest step has already been the source of its transitions
        if self.buffer.is_full() {
            self.buffer.pop_front();
        }
        self.buffer.append(step)?;
        self.next_observations = Some(next_timestep.observations.clone());
        self.start_of_episode = false;

        self.write()?;

        if next_timestep.last() {
            self.drain()?;
            self.reset();
        }
        Ok(())
    }

    /// Discards the buffer and the pending observations without writing.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.next_observations = None;
        self.next_extras = Extras::new();
        self.start_of_episode = false;
    }

    /// Writes the remaining transitions of the episode, shortest last, until the
    /// buffer is empty.
    pub fn drain(&mut self) -> Result<()> {
        self.buffer.pop_front();
        while !self.buffer.is_empty() {
            self.write()?;
            self.buffer.pop_front();
        }
        Ok(())
    }

    /// Writes the transition of the current window.
    ///
    /// Nothing is written to the sink until the transition and all its priorities
    /// have been computed.
    fn write(&mut self) -> Result<()> {
        let next_observations = match &self.next_observations {
            Some(next_observations) => next_observations.clone(),
            None => return Err(FlockError::AddFirstRequired.into()),
        };
        let (n_step_return, total_discount) = self.accumulate()?;

        let first = match self.buffer.front() {
            Some(first) => first,
            None => return Ok(()),
        };
        let transition = Transition {
            observations: first.observations.clone(),
            actions: first.actions.clone(),
            n_step_return,
            total_discount,
            next_observations: next_observations.clone(),
            extras: match first.extras.is_empty() {
                true => None,
                false => Some(first.extras.clone()),
            },
        };

        let priorities = {
            let final_step = self
                .final_step_placeholder
                .get_or_insert_with(|| first.zeros_like(next_observations.clone()));
            final_step.observations = next_observations;
            let steps = self
                .buffer
                .iter()
                .chain(std::iter::once(&*final_step))
                .collect::<Vec<_>>();
            calculate_priorities(&self.priority_fns, &steps)
        };

        trace!("Write a transition of {} steps", self.buffer.len());
        self.sink.append(transition)?;
        for (table, priority) in priorities.iter() {
            self.sink.create_item(table, 1, *priority)?;
        }
        Ok(())
    }

    /// Computes the N-step return and total discount of each agent of the first step.
    fn accumulate(&self) -> Result<(AgentMap<Tensor>, AgentMap<Tensor>)> {
        let first = match self.buffer.front() {
            Some(first) => first,
            None => return Ok((AgentMap::new(), AgentMap::new())),
        };
        let mut n_step_returns = AgentMap::new();
        let mut total_discounts = AgentMap::new();

        for (agent, discount) in first.discounts.iter() {
            let reward = first
                .reward(agent)
                .ok_or_else(|| agent_missing("rewards", &first.discounts, &first.rewards))?;

            // Accumulators get the broadcast shape and type of reward, discount and the
            // accumulator discount, as copies of the first step's values.
            let shape = broadcast_shape(reward.shape(), discount.shape())?;
            let dtype = reward
                .dtype()
                .promote(discount.dtype())
                .promote(self.discount.dtype());
            let mut n_step_return = reward.broadcast_to(&shape)?.cast(dtype);
            let mut total_discount = discount.broadcast_to(&shape)?.cast(dtype);

            // total_discount ends one environment discount short of the window length
            for step in self.buffer.iter().skip(1) {
                let step_discount = step
                    .discounts
                    .get(agent)
                    .ok_or_else(|| agent_missing("discounts", &first.discounts, &step.discounts))?;
                let step_reward = step
                    .reward(agent)
                    .ok_or_else(|| agent_missing("rewards", &first.discounts, &step.rewards))?;

                total_discount.mul_assign(&self.discount)?;
                n_step_return.add_assign(&step_reward.mul(&total_discount)?)?;
                total_discount.mul_assign(step_discount)?;
            }

            n_step_returns.insert(agent.clone(), n_step_return);
            total_discounts.insert(agent.clone(), total_discount);
        }
        Ok((n_step_returns, total_discounts))
    }
}

fn agent_missing(
    field: &'static str,
    expected: &AgentMap<Tensor>,
    actual: &AgentMap<Tensor>,
) -> FlockError {
    FlockError::AgentKeyMismatch {
        field,
        expected: expected.keys().cloned().collect(),
        actual: actual.keys().cloned().collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        adder::{PriorityFn, DEFAULT_PRIORITY_TABLE},
        DType, MemoryReplaySink, StepType,
    };
    use test_log::test;

    const AGENT: &str = "agent_0";

    fn agent_map(v: Tensor) -> AgentMap<Tensor> {
        let mut m = AgentMap::new();
        m.insert(AGENT.to_string(), v);
        m
    }

    fn obs(t: usize) -> AgentMap<Tensor> {
        agent_map(Tensor::scalar(t as f64, DType::F32))
    }

    fn act() -> AgentMap<Tensor> {
        agent_map(Tensor::from(1i32))
    }

    fn timestep(t: usize, reward: f64, discount: f64, step_type: StepType) -> TimeStep {
        TimeStep {
            step_type,
            observations: obs(t),
            rewards: agent_map(Tensor::scalar(reward, DType::F64)),
            discounts: agent_map(Tensor::scalar(discount, DType::F64)),
        }
    }

    fn adder(n_step: usize, discount: f32) -> NStepTransitionAdder<MemoryReplaySink> {
        let config = NStepTransitionAdderConfig::default()
            .n_step(n_step)
            .discount(discount);
        NStepTransitionAdder::build(&config, MemoryReplaySink::new(), None).unwrap()
    }

    /// Runs an episode with the given rewards and discounts.
    fn run_episode<W: ReplaySink>(
        adder: &mut NStepTransitionAdder<W>,
        rewards: &[f64],
        discounts: &[f64],
    ) -> Result<()> {
        adder.add_first(&TimeStep::restart(obs(0)), Extras::new())?;
        for (i, (r, d)) in rewards.iter().zip(discounts.iter()).enumerate() {
            let step_type = match i + 1 == rewards.len() {
                true => StepType::Last,
                false => StepType::Mid,
            };
            adder.add(act(), &timestep(i + 1, *r, *d, step_type), Extras::new())?;
        }
        Ok(())
    }

    fn scalar(m: &AgentMap<Tensor>) -> f64 {
        m[AGENT].item().unwrap()
    }

    #[test]
    fn test_invalid_n_step() {
        let config = NStepTransitionAdderConfig::default().n_step(0);
        let err = NStepTransitionAdder::build(&config, MemoryReplaySink::new(), None)
            .err()
            .unwrap();
        assert_eq!(
            err.downcast_ref::<FlockError>(),
            Some(&FlockError::InvalidNStep(0))
        );
    }

    #[test]
    fn test_add_requires_add_first() {
        let mut adder = adder(3, 0.9);
        let err = adder
            .add(act(), &timestep(1, 1.0, 1.0, StepType::Mid), Extras::new())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlockError>(),
            Some(&FlockError::AddFirstRequired)
        );

        let err = adder
            .add_first(&timestep(0, 0.0, 1.0, StepType::Mid), Extras::new())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlockError>(),
            Some(&FlockError::NotFirstTimeStep("Mid".to_string()))
        );
    }

    #[test]
    fn test_one_step_transition() -> Result<()> {
        let mut adder = adder(1, 0.9);
        run_episode(&mut adder, &[2.5], &[1.0])?;

        let sink = adder.sink();
        assert_eq!(sink.num_transitions(), 1);
        let tr = &sink.transitions()[0];
        assert_eq!(scalar(&tr.n_step_return), 2.5);
        assert_eq!(scalar(&tr.total_discount), 1.0);
        assert_eq!(tr.observations, obs(0));
        assert_eq!(tr.next_observations, obs(1));
        assert_eq!(tr.extras, None);
        assert_eq!(sink.len(DEFAULT_PRIORITY_TABLE), 1);
        assert_eq!(sink.items(DEFAULT_PRIORITY_TABLE)[0].priority, 1.0);
        Ok(())
    }

    #[test]
    fn test_ramp_and_drain() -> Result<()> {
        // Priority of an item is the length of its window
        let window_len: PriorityFn = Box::new(|steps: &[&Step]| (steps.len() - 1) as f64);
        let mut priority_fns = PriorityFnMapping::new();
        priority_fns.insert("window".to_string(), Some(window_len));
        let config = NStepTransitionAdderConfig::default().n_step(3).discount(1.0);
        let mut adder =
            NStepTransitionAdder::build(&config, MemoryReplaySink::new(), Some(priority_fns))?;

        run_episode(&mut adder, &[1.0; 5], &[1.0, 1.0, 1.0, 1.0, 0.0])?;

        let sink = adder.sink();
        let lens = sink
            .items("window")
            .iter()
            .map(|item| item.priority as usize)
            .collect::<Vec<_>>();
        assert_eq!(lens, vec![1, 2, 3, 3, 3, 2, 1]);

        let sources = sink
            .transitions()
            .iter()
            .map(|tr| scalar(&tr.observations) as usize)
            .collect::<Vec<_>>();
        assert_eq!(sources, vec![0, 0, 0, 1, 2, 3, 4]);

        let arrivals = sink
            .transitions()
            .iter()
            .map(|tr| scalar(&tr.next_observations) as usize)
            .collect::<Vec<_>>();
        assert_eq!(arrivals, vec![1, 2, 3, 4, 5, 5, 5]);

        // Returns equal the window lengths with unit rewards and discounts
        let returns = sink
            .transitions()
            .iter()
            .map(|tr| scalar(&tr.n_step_return))
            .collect::<Vec<_>>();
        assert_eq!(returns, vec![1., 2., 3., 3., 3., 2., 1.]);
        assert_eq!(sink.len(DEFAULT_PRIORITY_TABLE), 0);
        Ok(())
    }

    #[test]
    fn test_n_step_return() -> Result<()> {
        let mut adder = adder(3, 0.9);
        run_episode(&mut adder, &[1.0, 2.0, 3.0], &[1.0, 1.0, 0.0])?;

        let g = 0.9f32 as f64;
        let tr = &adder.sink().transitions()[2];
        assert_eq!(
            scalar(&tr.n_step_return),
            1.0 + g * 1.0 * 2.0 + g * g * 1.0 * 1.0 * 3.0
        );
        assert_eq!(scalar(&tr.total_discount), 0.0);
        assert_eq!(tr.n_step_return[AGENT].dtype(), DType::F64);

        // Two-step window: one accumulator discount, one environment discount
        let tr = &adder.sink().transitions()[1];
        assert_eq!(scalar(&tr.n_step_return), 1.0 + g * 2.0);
        assert_eq!(scalar(&tr.total_discount), g);
        Ok(())
    }

    #[test]
    fn test_extras_from_first_step() -> Result<()> {
        let extras = |h: i32| {
            let mut e = Extras::new();
            e.insert("h".to_string(), Tensor::from(h));
            e
        };
        let mut adder = adder(2, 0.9);
        adder.add_first(&TimeStep::restart(obs(0)), extras(5))?;
        adder.add(act(), &timestep(1, 1.0, 1.0, StepType::Mid), extras(9))?;
        adder.add(act(), &timestep(2, 1.0, 1.0, StepType::Mid), extras(13))?;

        let transitions = adder.sink().transitions();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[1].extras, Some(extras(5)));
        Ok(())
    }

    #[test]
    fn test_empty_reward_is_zero() -> Result<()> {
        let mut adder = adder(2, 0.9);
        adder.add_first(&TimeStep::restart(obs(0)), Extras::new())?;
        let ts = TimeStep {
            step_type: StepType::Mid,
            observations: obs(1),
            rewards: AgentMap::new(),
            discounts: agent_map(Tensor::scalar(1.0, DType::F64)),
        };
        adder.add(act(), &ts, Extras::new())?;

        let tr = &adder.sink().transitions()[0];
        assert_eq!(tr.n_step_return[AGENT], Tensor::scalar(0.0, DType::F64));
        Ok(())
    }

    #[test]
    fn test_broadcast_reward_and_discount() -> Result<()> {
        let mut adder = adder(2, 0.5);
        adder.add_first(&TimeStep::restart(obs(0)), Extras::new())?;
        let ts = |t: usize| TimeStep {
            step_type: StepType::Mid,
            observations: obs(t),
            rewards: agent_map(Tensor::from(vec![1f32, 2.])),
            discounts: agent_map(Tensor::from(1f32)),
        };
        adder.add(act(), &ts(1), Extras::new())?;
        adder.add(act(), &ts(2), Extras::new())?;

        let tr = &adder.sink().transitions()[1];
        assert_eq!(tr.n_step_return[AGENT].to_vec(), vec![1.5, 3.0]);
        assert_eq!(tr.total_discount[AGENT].to_vec(), vec![0.5, 0.5]);
        assert_eq!(tr.total_discount[AGENT].dtype(), DType::F32);
        Ok(())
    }

    #[test]
    fn test_agent_key_mismatch() -> Result<()> {
        let mut adder = adder(2, 0.9);
        adder.add_first(&TimeStep::restart(obs(0)), Extras::new())?;
        let mut ts = timestep(1, 1.0, 1.0, StepType::Mid);
        ts.discounts.insert("agent_1".to_string(), Tensor::from(1f32));
        let err = adder.add(act(), &ts, Extras::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlockError>(),
            Some(FlockError::AgentKeyMismatch { field: "discounts", .. })
        ));
        assert_eq!(adder.sink().num_transitions(), 0);
        Ok(())
    }

    #[test]
    fn test_final_step_given_to_priority_fns() -> Result<()> {
        let arrival: PriorityFn = Box::new(|steps: &[&Step]| {
            let last = steps[steps.len() - 1];
            assert_eq!(last.rewards[AGENT].item(), Some(0.0));
            assert_eq!(last.actions[AGENT].item(), Some(0.0));
            last.observations[AGENT].item().unwrap()
        });
        let mut priority_fns = PriorityFnMapping::new();
        priority_fns.insert("arrival".to_string(), Some(arrival));
        let config = NStepTransitionAdderConfig::default().n_step(2);
        let mut adder =
            NStepTransitionAdder::build(&config, MemoryReplaySink::new(), Some(priority_fns))?;
        run_episode(&mut adder, &[1.0, 1.0, 1.0], &[1.0, 1.0, 0.0])?;

        let priorities = adder
            .sink()
            .items("arrival")
            .iter()
            .map(|item| item.priority)
            .collect::<Vec<_>>();
        assert_eq!(priorities, vec![1., 2., 3., 3.]);
        Ok(())
    }

    #[test]
    fn test_interrupted_episode_is_drained() -> Result<()> {
        let mut adder = adder(3, 1.0);
        adder.add_first(&TimeStep::restart(obs(0)), Extras::new())?;
        adder.add(act(), &timestep(1, 1.0, 1.0, StepType::Mid), Extras::new())?;
        adder.add(act(), &timestep(2, 1.0, 1.0, StepType::Mid), Extras::new())?;
        assert_eq!(adder.sink().num_transitions(), 2);

        // A new episode starts before the last timestep arrived
        adder.add_first(&TimeStep::restart(obs(0)), Extras::new())?;
        let sink = adder.sink();
        assert_eq!(sink.num_transitions(), 3);
        let tr = &sink.transitions()[2];
        assert_eq!(scalar(&tr.observations), 1.0);
        assert_eq!(scalar(&tr.next_observations), 2.0);
        Ok(())
    }
}
