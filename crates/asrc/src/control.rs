//! Request dispatch for the user-facing control channel.
//!
//! A character device, RPC endpoint or shell command hands raw requests to
//! [`AsrcSubsystem::handle`]; the pair index arrives unvalidated.

use platform::{RegisterBus, VolumeRamp};

use crate::config::PairConfig;
use crate::dump::RegisterDump;
use crate::error::Error;
use crate::pair::PairInfo;
use crate::subsystem::AsrcSubsystem;

/// One control request addressed to a pair.
#[derive(Debug)]
pub enum Request<'a> {
    /// Configure and start the pair.
    Start(PairConfig),
    /// Stop the pair.
    Stop,
    /// Convert a block of input samples.
    PushPcm(&'a [u8]),
    /// Copy converted samples out.
    PopPcm(&'a mut [u8]),
    /// Set the Q24 output gain.
    SetVolumeGain(u32),
    /// Set the volume ramp.
    SetVolumeRamp(VolumeRamp),
    /// Report path, state and format.
    GetInfo,
    /// Snapshot the pair's registers.
    DumpRegisters,
}

/// Successful outcome of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Pair started.
    Started,
    /// Pair stopped.
    Stopped,
    /// Bytes of output produced by the push.
    Pushed(usize),
    /// Bytes copied out.
    Popped(usize),
    /// Gain or ramp stored.
    VolumeUpdated,
    /// Pair snapshot.
    Info(PairInfo),
    /// Register snapshot.
    Registers(RegisterDump),
}

impl<B: RegisterBus> AsrcSubsystem<B> {
    /// Validate `pair` and run `request` on it.
    pub async fn handle(&self, pair: u8, request: Request<'_>) -> Result<Response, Error> {
        let id = Self::pair_id(pair)?;
        match request {
            Request::Start(cfg) => self.start(id, &cfg).await.map(|()| Response::Started),
            Request::Stop => self.stop(id).await.map(|()| Response::Stopped),
            Request::PushPcm(data) => self.push(id, data).await.map(Response::Pushed),
            Request::PopPcm(out) => self.pop(id, out).await.map(Response::Popped),
            Request::SetVolumeGain(gain) => self
                .set_volume_gain(id, gain)
                .await
                .map(|()| Response::VolumeUpdated),
            Request::SetVolumeRamp(ramp) => self
                .set_volume_ramp(id, ramp)
                .await
                .map(|()| Response::VolumeUpdated),
            Request::GetInfo => self.info(id).await.map(Response::Info),
            Request::DumpRegisters => self.dump_registers(id).await.map(Response::Registers),
        }
    }
}
