use super::ParameterServer;
use crate::{FlockDistributedError, ParameterStore, Parameters, ServerMessage};
use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::info;
use std::thread::{self, JoinHandle};

impl ParameterServer {
    /// Moves the server onto its own thread.
    ///
    /// Requests are sent to the thread through the returned handle, which can be cloned
    /// and given to any number of clients. The thread runs until
    /// [`ParameterServerHandle::stop()`] is called or every handle is dropped.
    pub fn spawn(self) -> Result<(ParameterServerHandle, JoinHandle<()>)> {
        let (sender, receiver) = unbounded();
        let handle = thread::Builder::new()
            .name("parameter-server".to_string())
            .spawn(move || self.serve(receiver))?;
        Ok((ParameterServerHandle { sender }, handle))
    }

    fn serve(self, receiver: Receiver<ServerMessage>) {
        info!("Starts parameter server with {} parameters", self.names().len());
        for msg in receiver.iter() {
            // A reply fails only if the requester has gone away.
            match msg {
                ServerMessage::Get(names, reply) => {
                    let _ = reply.send(self.get_parameters(&names));
                }
                ServerMessage::Set(values, reply) => {
                    let _ = reply.send(self.set_parameters(values));
                }
                ServerMessage::Add(deltas, reply) => {
                    let _ = reply.send(self.add_to_parameters(deltas));
                }
                ServerMessage::Stop => break,
            }
        }
        info!("Stopped parameter server");
    }
}

/// Handle of a [`ParameterServer`] running on its own thread.
#[derive(Clone)]
pub struct ParameterServerHandle {
    sender: Sender<ServerMessage>,
}

impl ParameterServerHandle {
    /// Stops the service thread.
    ///
    /// Requests sent after this call fail with
    /// [`FlockDistributedError::ServerDisconnected`].
    pub fn stop(&self) -> Result<()> {
        self.sender
            .send(ServerMessage::Stop)
            .map_err(|_| FlockDistributedError::ServerDisconnected)?;
        Ok(())
    }

    fn request<T>(&self, msg: impl FnOnce(Sender<Result<T>>) -> ServerMessage) -> Result<T> {
        let (sender, receiver) = bounded(1);
        self.sender
            .send(msg(sender))
            .map_err(|_| FlockDistributedError::ServerDisconnected)?;
        receiver
            .recv()
            .map_err(|_| FlockDistributedError::ServerDisconnected)?
    }
}

impl ParameterStore for ParameterServerHandle {
    fn get_parameters(&self, names: &[String]) -> Result<Parameters> {
        let names = names.to_vec();
        self.request(|reply| ServerMessage::Get(names, reply))
    }

    fn set_parameters(&self, values: Parameters) -> Result<()> {
        self.request(|reply| ServerMessage::Set(values, reply))
    }

    fn add_to_parameters(&self, deltas: Parameters) -> Result<()> {
        self.request(|reply| ServerMessage::Add(deltas, reply))
    }
}
