//! Location → POI fetch, as two worker threads joined by a one-shot channel.
//!
//! Stage 1 acquires the coordinate and hands it to stage 2, which fetches
//! POIs for it. Both stages report to the UI through one event channel;
//! the UI drains it from its timer, the same way camera frames arrive.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, sync_channel, Receiver, RecvTimeoutError, Sender, TryRecvError},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use log::{info, warn};

use crate::{
    location::{acquire_location, LocationError, LocationProvider},
    model::{Coordinate, PointOfInterest},
    poi::PoiSource,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenEvent {
    LocationResolved(Coordinate),
    LocationDenied(String),
    FetchStarted(Coordinate),
    PoisLoaded(Vec<PointOfInterest>),
    PoisFailed(String),
}

pub struct Pipeline {
    events: Receiver<ScreenEvent>,
    cancelled: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

pub fn spawn<L, S>(locator: L, source: S) -> Pipeline
where
    L: LocationProvider + Send + 'static,
    S: PoiSource + Send + 'static,
{
    let (event_sender, events) = channel();
    let (coord_sender, coord_receiver) = sync_channel::<Coordinate>(1);
    let cancelled = Arc::new(AtomicBool::new(false));

    let locate = {
        let events = Emitter::new(event_sender.clone(), cancelled.clone());
        std::thread::spawn(move || {
            match acquire_location(&locator) {
                Ok(coord) => {
                    info!("location: {},{}", coord.latitude, coord.longitude);
                    events.emit(ScreenEvent::LocationResolved(coord));
                    if !events.is_cancelled() {
                        let _ = coord_sender.send(coord);
                    }
                }
                Err(LocationError::PermissionDenied) => {
                    warn!("{}", LocationError::PermissionDenied);
                    events.emit(ScreenEvent::LocationDenied(
                        LocationError::PermissionDenied.to_string(),
                    ));
                }
                // Left pending: the fetch stage ends once the sender drops.
                Err(err) => warn!("location fix failed: {err}"),
            }
        })
    };

    let fetch = {
        let events = Emitter::new(event_sender, cancelled.clone());
        std::thread::spawn(move || {
            // Stage 1 sends at most one coordinate, then drops the sender.
            let Ok(coord) = coord_receiver.recv() else {
                return;
            };
            if events.is_cancelled() {
                return;
            }
            events.emit(ScreenEvent::FetchStarted(coord));
            match source.fetch_pois(coord) {
                Ok(pois) => events.emit(ScreenEvent::PoisLoaded(pois)),
                Err(err) => {
                    warn!("poi fetch failed: {err}");
                    events.emit(ScreenEvent::PoisFailed(err.to_string()));
                }
            }
        })
    };

    Pipeline {
        events,
        cancelled,
        workers: vec![locate, fetch],
    }
}

impl Pipeline {
    pub fn try_recv(&self) -> Option<ScreenEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// `None` on timeout or once both stages have finished.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScreenEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop emitting. A request already in flight runs to completion and
    /// its result is dropped.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|w| w.is_finished())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Workers may be parked on GPS or network; they are not joined.
        self.cancel();
    }
}

struct Emitter {
    sender: Sender<ScreenEvent>,
    cancelled: Arc<AtomicBool>,
}

impl Emitter {
    fn new(sender: Sender<ScreenEvent>, cancelled: Arc<AtomicBool>) -> Self {
        Self { sender, cancelled }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ScreenEvent) {
        if self.is_cancelled() {
            return;
        }
        // The receiver is gone once the screen is torn down.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::PermissionState, poi::FetchError};
    use std::sync::{mpsc, Mutex};

    const WAIT: Duration = Duration::from_secs(5);

    struct FakeLocation {
        permission: PermissionState,
        fix: Result<Coordinate, LocationError>,
    }

    impl LocationProvider for FakeLocation {
        fn request_foreground_permission(&self) -> Result<PermissionState, LocationError> {
            Ok(self.permission)
        }

        fn current_position(&self) -> Result<Coordinate, LocationError> {
            self.fix.clone()
        }
    }

    #[derive(Clone, Default)]
    struct FakeSource {
        calls: Arc<Mutex<Vec<Coordinate>>>,
        fail: bool,
    }

    impl PoiSource for FakeSource {
        fn fetch_pois(&self, coord: Coordinate) -> Result<Vec<PointOfInterest>, FetchError> {
            self.calls.lock().unwrap().push(coord);
            if self.fail {
                return Err(FetchError::Status(500));
            }
            Ok(vec![PointOfInterest {
                name: "Cafe".into(),
                address: "1 Main St".into(),
                lat: coord.latitude,
                lon: coord.longitude,
            }])
        }
    }

    fn drain(pipeline: &Pipeline) -> Vec<ScreenEvent> {
        let mut events = vec![];
        while let Some(event) = pipeline.recv_timeout(WAIT) {
            events.push(event);
        }
        events
    }

    #[test]
    fn granted_location_triggers_one_fetch() {
        let coord = Coordinate::new(37.0, -122.0);
        let source = FakeSource::default();
        let pipeline = spawn(
            FakeLocation {
                permission: PermissionState::Granted,
                fix: Ok(coord),
            },
            source.clone(),
        );

        let events = drain(&pipeline);
        assert_eq!(events[0], ScreenEvent::LocationResolved(coord));
        assert_eq!(events[1], ScreenEvent::FetchStarted(coord));
        assert!(matches!(&events[2], ScreenEvent::PoisLoaded(p) if p.len() == 1));
        assert_eq!(events.len(), 3);
        assert_eq!(*source.calls.lock().unwrap(), vec![coord]);
    }

    #[test]
    fn denied_location_never_fetches() {
        let source = FakeSource::default();
        let pipeline = spawn(
            FakeLocation {
                permission: PermissionState::Denied,
                fix: Ok(Coordinate::new(1.0, 1.0)),
            },
            source.clone(),
        );

        let events = drain(&pipeline);
        assert_eq!(
            events,
            vec![ScreenEvent::LocationDenied(
                "Permission to access location was denied".into()
            )]
        );
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_fix_stays_pending() {
        let source = FakeSource::default();
        let pipeline = spawn(
            FakeLocation {
                permission: PermissionState::Granted,
                fix: Err(LocationError::Unavailable("no gps".into())),
            },
            source.clone(),
        );

        assert!(drain(&pipeline).is_empty());
        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn fetch_failure_is_reported() {
        let coord = Coordinate::new(10.0, 20.0);
        let pipeline = spawn(
            FakeLocation {
                permission: PermissionState::Granted,
                fix: Ok(coord),
            },
            FakeSource {
                fail: true,
                ..FakeSource::default()
            },
        );

        let events = drain(&pipeline);
        assert!(matches!(events.last(), Some(ScreenEvent::PoisFailed(msg)) if msg.contains("500")));
    }

    struct BlockingLocation {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl LocationProvider for BlockingLocation {
        fn request_foreground_permission(&self) -> Result<PermissionState, LocationError> {
            let _ = self.release.lock().unwrap().recv();
            Ok(PermissionState::Granted)
        }

        fn current_position(&self) -> Result<Coordinate, LocationError> {
            Ok(Coordinate::new(5.0, 5.0))
        }
    }

    #[test]
    fn cancel_suppresses_later_events() {
        let (release, gate) = mpsc::channel();
        let source = FakeSource::default();
        let pipeline = spawn(
            BlockingLocation {
                release: Mutex::new(gate),
            },
            source.clone(),
        );

        pipeline.cancel();
        release.send(()).unwrap();

        assert!(drain(&pipeline).is_empty());
        assert!(pipeline.is_cancelled());
        assert!(source.calls.lock().unwrap().is_empty());
    }

    struct GatedSource {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl PoiSource for GatedSource {
        fn fetch_pois(&self, coord: Coordinate) -> Result<Vec<PointOfInterest>, FetchError> {
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(vec![PointOfInterest {
                name: "Late".into(),
                address: "2 Side St".into(),
                lat: coord.latitude,
                lon: coord.longitude,
            }])
        }
    }

    #[test]
    fn cancel_during_fetch_drops_its_result() {
        let coord = Coordinate::new(3.0, 4.0);
        let (started, fetching) = mpsc::channel();
        let (release, gate) = mpsc::channel();
        let pipeline = spawn(
            FakeLocation {
                permission: PermissionState::Granted,
                fix: Ok(coord),
            },
            GatedSource {
                started: Mutex::new(started),
                release: Mutex::new(gate),
            },
        );

        fetching.recv_timeout(WAIT).unwrap();
        pipeline.cancel();
        release.send(()).unwrap();

        let events = drain(&pipeline);
        assert_eq!(
            events,
            vec![
                ScreenEvent::LocationResolved(coord),
                ScreenEvent::FetchStarted(coord),
            ]
        );
    }
}
