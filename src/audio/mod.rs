pub mod device;
pub mod events;
#[cfg(feature = "audio")]
pub mod player;
pub mod queue;
pub mod simulated;
pub mod track;

pub use device::{
    AudioDevice, BindingId, DeviceError, DeviceEvent, DeviceEventKind, DeviceEventSender,
    DeviceSignal, ListenerId,
};
#[cfg(feature = "audio")]
pub use player::RodioDevice;
pub use queue::PlaylistQueue;
pub use simulated::{DeviceCall, SimulatedControls, SimulatedDevice};
pub use track::{Track, TrackId};
