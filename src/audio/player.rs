// rodio-backed output binding: one Sink per loaded resource.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use super::device::{
    AudioDevice, BindingId, BindingSequence, DeviceError, DeviceEventKind, DeviceEventSender,
    DeviceSignal, ListenerId,
};
use super::events::ListenerSet;

/// Where a media url points once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    Local(PathBuf),
    Remote(String),
}

impl MediaLocation {
    pub fn parse(url: &str) -> Result<Self, DeviceError> {
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(MediaLocation::Local(PathBuf::from(path)));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(MediaLocation::Remote(url.to_string()));
        }
        match url.split_once("://") {
            Some((scheme, _)) => Err(DeviceError::Unavailable {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", scheme),
            }),
            None => Ok(MediaLocation::Local(PathBuf::from(url))),
        }
    }
}

type FetchResult = Result<Vec<u8>, String>;

/// A remote resource still downloading on a worker thread.
struct PendingFetch {
    url: String,
    receiver: std_mpsc::Receiver<FetchResult>,
}

pub struct RodioDevice {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    binding: Option<BindingId>,
    // Url behind `binding`, kept so a drained resource can be replayed
    url: Option<String>,
    bindings: BindingSequence,
    listeners: ListenerSet,
    volume: f32,
    duration: Option<Duration>,
    pending: Option<PendingFetch>,
    // Set once a decoded source is attached to the sink
    attached: bool,
    metadata_announced: bool,
    ended_announced: bool,
}

impl RodioDevice {
    pub fn new() -> Result<Self, DeviceError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| DeviceError::Output(e.to_string()))?;
        info!("Opened default audio output");

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            binding: None,
            url: None,
            bindings: BindingSequence::default(),
            listeners: ListenerSet::new(),
            volume: 1.0,
            duration: None,
            pending: None,
            attached: false,
            metadata_announced: false,
            ended_announced: false,
        })
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        if let Some(pending) = self.pending.take() {
            debug!("Discarding pending download of {}", pending.url);
        }
        self.binding = None;
        self.url = None;
        self.duration = None;
        self.attached = false;
        self.metadata_announced = false;
        self.ended_announced = false;
    }

    fn attach<R>(&mut self, url: &str, reader: R) -> Result<(), DeviceError>
    where
        R: std::io::Read + std::io::Seek + Send + Sync + 'static,
    {
        let source = Decoder::new(reader).map_err(|e| DeviceError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.duration = source.total_duration();
        if let Some(sink) = &self.sink {
            sink.append(source);
        }
        self.attached = true;
        Ok(())
    }

    fn open_local(&mut self, url: &str, path: PathBuf) -> Result<(), DeviceError> {
        let file = File::open(&path).map_err(|e| DeviceError::Unavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.attach(url, BufReader::new(file))
    }

    #[cfg(feature = "remote")]
    fn open_remote(&mut self, url: String) -> Result<(), DeviceError> {
        let (sender, receiver) = std_mpsc::channel();
        let fetch_url = url.clone();
        std::thread::Builder::new()
            .name("playdeck-fetch".to_string())
            .spawn(move || {
                let result = reqwest::blocking::get(&fetch_url)
                    .and_then(|response| response.error_for_status())
                    .and_then(|response| response.bytes())
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| e.to_string());
                // Receiver is gone when the binding was replaced meanwhile
                let _ = sender.send(result);
            })
            .map_err(|e| DeviceError::Unavailable {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        self.pending = Some(PendingFetch { url, receiver });
        Ok(())
    }

    #[cfg(not(feature = "remote"))]
    fn open_remote(&mut self, url: String) -> Result<(), DeviceError> {
        Err(DeviceError::Unavailable {
            url,
            reason: "built without remote media support".to_string(),
        })
    }

    fn open(&mut self, url: &str) -> Result<(), DeviceError> {
        match MediaLocation::parse(url)? {
            MediaLocation::Local(path) => self.open_local(url, path),
            MediaLocation::Remote(remote) => self.open_remote(remote),
        }
    }

    /// Queue the bound resource again after its sink drained. The binding is
    /// kept, so the next end-of-track is reported against it as well.
    fn replay(&mut self) -> Result<(), DeviceError> {
        let url = self.url.clone().ok_or(DeviceError::NoResource)?;
        debug!("Replaying {}", url);
        self.attached = false;
        self.ended_announced = false;
        self.open(&url)
    }

    fn poll_pending(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        let outcome = match pending.receiver.try_recv() {
            Ok(result) => result,
            Err(std_mpsc::TryRecvError::Empty) => return,
            Err(std_mpsc::TryRecvError::Disconnected) => Err("download worker exited".to_string()),
        };
        let Some(pending) = self.pending.take() else {
            return;
        };

        let failure = match outcome {
            Ok(bytes) => {
                debug!("Downloaded {} ({} bytes)", pending.url, bytes.len());
                self.attach(&pending.url, Cursor::new(bytes)).err().map(|e| e.to_string())
            }
            Err(reason) => Some(format!("failed to fetch {}: {}", pending.url, reason)),
        };

        if let (Some(reason), Some(binding)) = (failure, self.binding) {
            warn!("{}", reason);
            self.listeners.emit(binding, DeviceSignal::Failed { reason });
        }
    }
}

impl AudioDevice for RodioDevice {
    fn load(&mut self, url: &str) -> Result<BindingId, DeviceError> {
        self.release();

        MediaLocation::parse(url)?;
        let sink = Sink::try_new(&self.stream_handle).map_err(|e| DeviceError::Output(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);
        self.sink = Some(sink);

        if let Err(e) = self.open(url) {
            self.release();
            return Err(e);
        }

        let binding = self.bindings.next_id();
        self.binding = Some(binding);
        self.url = Some(url.to_string());
        debug!("Bound {} as binding {}", url, binding.get());
        Ok(binding)
    }

    /// Resumes, or starts over from the top once the resource has played out.
    fn play(&mut self) -> Result<(), DeviceError> {
        let drained = self.sink.as_ref().ok_or(DeviceError::NoResource)?.empty();
        if self.attached && drained {
            self.replay()?;
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn current_time(&self) -> Duration {
        self.sink.as_ref().map(|sink| sink.get_pos()).unwrap_or(Duration::ZERO)
    }

    fn set_current_time(&mut self, position: Duration) -> Result<(), DeviceError> {
        let sink = self.sink.as_ref().ok_or(DeviceError::NoResource)?;
        sink.try_seek(position).map_err(|e| DeviceError::Seek(e.to_string()))
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn subscribe(&mut self, kinds: &[DeviceEventKind], sender: DeviceEventSender) -> ListenerId {
        self.listeners.subscribe(kinds, sender)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        self.listeners.unsubscribe(listener);
    }

    fn poll(&mut self) {
        self.poll_pending();

        let Some(binding) = self.binding else {
            return;
        };
        if !self.attached {
            return;
        }

        if !self.metadata_announced {
            self.metadata_announced = true;
            self.listeners.emit(
                binding,
                DeviceSignal::MetadataLoaded {
                    duration: self.duration,
                },
            );
        }

        let Some(sink) = &self.sink else {
            return;
        };
        if sink.empty() {
            if !self.ended_announced {
                self.ended_announced = true;
                self.listeners.emit(binding, DeviceSignal::Ended);
            }
        } else if !sink.is_paused() {
            let elapsed = sink.get_pos();
            self.listeners.emit(
                binding,
                DeviceSignal::Progressed {
                    elapsed,
                    duration: self.duration,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_location_parsing() {
        assert_eq!(
            MediaLocation::parse("file:///music/a.mp3").unwrap(),
            MediaLocation::Local(PathBuf::from("/music/a.mp3"))
        );
        assert_eq!(
            MediaLocation::parse("songs/b.flac").unwrap(),
            MediaLocation::Local(PathBuf::from("songs/b.flac"))
        );
        assert_eq!(
            MediaLocation::parse("https://cdn.example.com/c.mp3").unwrap(),
            MediaLocation::Remote("https://cdn.example.com/c.mp3".to_string())
        );
        assert!(matches!(
            MediaLocation::parse("spotify://track/1"),
            Err(DeviceError::Unavailable { .. })
        ));
    }
}
