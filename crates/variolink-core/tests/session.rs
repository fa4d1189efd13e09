use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use variolink_core::protocol::{
    sentence, DeviceConfig, DeviceSession, Error, FilenameFormat, Result, Transport, XOFF, XON,
};
use variolink_core::store::{FixQuality, FlightDb, Route, Waypoint};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Scripted transport standing in for a real instrument.
struct MockPort {
    /// Chunks the "instrument" delivers, one per fill call.
    inbound: VecDeque<Vec<u8>>,
    /// Everything the session wrote, shared with the test body.
    outbound: Arc<Mutex<Vec<u8>>>,
}

impl MockPort {
    fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let port = Self {
            inbound: VecDeque::new(),
            outbound: Arc::clone(&outbound),
        };
        (port, outbound)
    }

    /// Queue one raw chunk.
    fn reply(&mut self, bytes: &[u8]) {
        self.inbound.push_back(bytes.to_vec());
    }

    /// Queue a full framed-reply bracket: XOFF, each payload wrapped in the
    /// sentence envelope, then XON.
    fn bracket(&mut self, payloads: &[&str]) {
        self.reply(&[XOFF]);
        for payload in payloads {
            self.reply(sentence::encode(payload).as_bytes());
        }
        self.reply(&[XON]);
    }

    /// Queue an IGC-style bracket: XOFF, each line verbatim, then XON.
    fn raw_bracket(&mut self, lines: &[&str]) {
        self.reply(&[XOFF]);
        for line in lines {
            self.reply(line.as_bytes());
        }
        self.reply(&[XON]);
    }
}

impl Transport for MockPort {
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.inbound.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    chunk.drain(..n);
                    self.inbound.push_front(chunk);
                }
                Ok(n)
            }
            None => Err(Error::Timeout),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.outbound.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn path(&self) -> &str {
        "/dev/mock"
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

fn session_with(port: MockPort) -> DeviceSession {
    DeviceSession::with_transport(Box::new(port), DeviceConfig::default())
}

/// In-memory trace sink shared with the test body.
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_identity() {
    let (mut port, outbound) = MockPort::new();
    port.bracket(&["PBRSNP,COMPEO+,STEPHANE FLYER,4321,2.24"]);

    let mut session = session_with(port);
    let identity = session.identity().unwrap();
    assert_eq!(identity.model, "COMPEO+");
    assert_eq!(identity.pilot, "STEPHANE FLYER");
    assert_eq!(identity.serial, 4321);
    assert_eq!(identity.firmware, "2.24");
    assert_eq!(identity.manufacturer(), "BRA");

    assert_eq!(outbound.lock().unwrap().as_slice(), b"$PBRSNP,*21\r\n");
}

#[test]
fn test_identity_is_memoized() {
    let (mut port, outbound) = MockPort::new();
    // Only one reply is scripted; the second call must not hit the wire.
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,1234,1.16"]);

    let mut session = session_with(port);
    let first = session.identity().unwrap();
    let second = session.identity().unwrap();
    assert_eq!(first, second);
    assert_eq!(outbound.lock().unwrap().len(), b"$PBRSNP,*21\r\n".len());
}

#[test]
fn test_missing_xoff_is_fatal() {
    let (mut port, _outbound) = MockPort::new();
    port.reply(b"G");

    let mut session = session_with(port);
    match session.identity() {
        Err(Error::UnexpectedCharacter(byte)) => assert_eq!(byte, b'G'),
        other => panic!("expected unexpected-character error, got {:?}", other),
    }
}

#[test]
fn test_silent_device_times_out() {
    let (port, _outbound) = MockPort::new();
    let mut session = session_with(port);
    assert!(matches!(session.identity(), Err(Error::Timeout)));
}

#[test]
fn test_stream_cut_mid_reply() {
    let (mut port, _outbound) = MockPort::new();
    port.reply(&[XOFF]);
    port.reply(b"");

    let mut session = session_with(port);
    assert!(matches!(session.identity(), Err(Error::UnexpectedEof)));
}

#[test]
fn test_track_list_assigns_day_indexes_and_filenames() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&[
        "PBRTL,3,0,16.06.09,12:34:56,01:02:03",
        "PBRTL,3,1,15.06.09,14:00:00,00:30:00",
        "PBRTL,3,2,15.06.09,09:00:00,00:45:00",
    ]);

    let mut session = session_with(port);
    let tracks = session.track_list().unwrap();
    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[0].duration_secs, 3723);

    // Two flights on the 15th: the earlier one is that day's first.
    assert_eq!(tracks[0].day_index, 1);
    assert_eq!(tracks[1].day_index, 2);
    assert_eq!(tracks[2].day_index, 1);

    assert_eq!(tracks[0].filename, "2009-06-16-FLY-42-01.IGC");
    assert_eq!(tracks[1].filename, "2009-06-15-FLY-42-02.IGC");
    assert_eq!(tracks[2].filename, "2009-06-15-FLY-42-01.IGC");
}

#[test]
fn test_track_list_is_memoized() {
    let (mut port, outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&["PBRTL,1,0,15.06.09,10:00:00,00:10:00"]);

    let mut session = session_with(port);
    let first = session.track_list().unwrap();
    let second = session.track_list().unwrap();
    assert_eq!(first, second);

    let traffic = outbound.lock().unwrap().len();
    assert_eq!(traffic, b"$PBRSNP,*21\r\n".len() + b"$PBRTL,*74\r\n".len());
}

#[test]
fn test_track_list_short_filenames() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&["PBRTL,1,0,15.06.09,10:00:00,00:10:00"]);

    let config = DeviceConfig {
        filename_format: FilenameFormat::Short,
        debug: false,
    };
    let mut session = DeviceSession::with_transport(Box::new(port), config);
    let tracks = session.track_list().unwrap();
    assert_eq!(tracks[0].filename, "96FF0161.IGC");
}

#[test]
fn test_empty_track_list() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&[]);

    let mut session = session_with(port);
    assert!(session.track_list().unwrap().is_empty());
}

#[test]
fn test_track_list_index_gap_is_inconsistent() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&[
        "PBRTL,2,0,16.06.09,12:00:00,00:30:00",
        "PBRTL,2,0,15.06.09,12:00:00,00:30:00",
    ]);

    let mut session = session_with(port);
    assert!(matches!(session.track_list(), Err(Error::Inconsistent(_))));
}

#[test]
fn test_track_list_count_mismatch_is_inconsistent() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&[
        "PBRTL,3,0,16.06.09,12:00:00,00:30:00",
        "PBRTL,3,1,15.06.09,12:00:00,00:30:00",
    ]);

    let mut session = session_with(port);
    assert!(matches!(session.track_list(), Err(Error::Inconsistent(_))));
}

#[test]
fn test_track_download() {
    let (mut port, outbound) = MockPort::new();
    port.raw_bracket(&[
        "AFLY05030\r\n",
        "HFDTE150609\r\n",
        "B1106554629397N00940468EA0177001807\r\n",
        "B1107004629401N00940470EA0177101811\r\n",
        "G3C4A\r\n",
    ]);

    let mut session = session_with(port);
    let points = session.track_points(1).unwrap();
    assert_eq!(points.len(), 2);

    let first = &points[0];
    assert_eq!(first.time.to_rfc3339(), "2009-06-15T11:06:55+00:00");
    assert!((first.latitude - 46.489_95).abs() < 1e-9);
    assert!((first.longitude - 9.674_466_666_666_667).abs() < 1e-9);
    assert_eq!(first.fix, FixQuality::ThreeD);
    assert_eq!(first.pressure_altitude, 1770);
    assert_eq!(first.gps_altitude, 1807);

    assert_eq!(outbound.lock().unwrap().as_slice(), b"$PBRTR,01*6B\r\n");
}

#[test]
fn test_track_log_download() {
    let (mut port, outbound) = MockPort::new();
    port.raw_bracket(&["HFDTE150609\r\n", "B1106554629397N00940468EA0177001807\r\n"]);

    let mut session = session_with(port);
    let points = session.track_log().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(outbound.lock().unwrap().as_slice(), b"$PBRIGC,*21\r\n");
}

#[test]
fn test_fix_before_date_header_is_fatal() {
    let (mut port, _outbound) = MockPort::new();
    port.raw_bracket(&["B1106554629397N00940468EA0177001807\r\n"]);

    let mut session = session_with(port);
    assert!(matches!(
        session.track_points(0),
        Err(Error::MalformedRecord { .. })
    ));
}

#[test]
fn test_overlong_reply_line() {
    let (mut port, _outbound) = MockPort::new();
    port.reply(&[XOFF]);
    port.reply(&vec![b'A'; 2000]);

    let mut session = session_with(port);
    assert!(matches!(session.track_log(), Err(Error::LineOverflow)));
}

#[test]
fn test_waypoint_list() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&[
        "PBRWPS,4629.541,N,00940.000,E,MEADOW           ,LANDING ZONE     ,2000",
        "PBRWPS,4624.000,N,00936.000,E,LANDING          ,FIELD            ,550",
    ]);

    let mut session = session_with(port);
    let waypoints = session.waypoints().unwrap();
    assert_eq!(waypoints.len(), 2);
    assert_eq!(waypoints[0].name, "MEADOW");
    assert_eq!(waypoints[0].description, "LANDING ZONE");
    assert!((waypoints[0].latitude - 46.492_35).abs() < 1e-9);
    assert_eq!(waypoints[1].altitude, 550);
}

#[test]
fn test_malformed_waypoint_aborts_the_list() {
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&[
        "PBRWPS,4629.541,N,00940.000,E,MEADOW           ,LANDING ZONE     ,2000",
        "PBRWPS,bogus",
    ]);

    let mut session = session_with(port);
    assert!(matches!(
        session.waypoints(),
        Err(Error::MalformedRecord { .. })
    ));
}

#[test]
fn test_corrupted_checksum_aborts_the_list() {
    let (mut port, _outbound) = MockPort::new();
    port.reply(&[XOFF]);
    port.reply(b"$PBRWPS,4629.541,N,00940.000,E,MEADOW,LZ,2000*00\r\n");
    port.reply(&[XON]);

    let mut session = session_with(port);
    assert!(matches!(
        session.waypoints(),
        Err(Error::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_route_list_resolves_waypoints() {
    init_tracing();

    let mut db = FlightDb::new();
    db.add_waypoint(Waypoint::new("MEADOW", 46.49235, 9.666_666_666_666_666, 2000));
    db.add_waypoint(Waypoint::new("LANDING", 46.4, 9.6, 550));

    let (mut port, _outbound) = MockPort::new();
    port.bracket(&[
        "PBRRTS,0,4,0,EVENING RUN      ",
        "PBRRTS,0,4,1,MEADOW           ",
        "PBRRTS,0,4,2,CLOUD BASE       ",
        "PBRRTS,0,4,3,LANDING          ",
    ]);

    let mut session = session_with(port);
    let routes = session.routes(&db).unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].name, "EVENING RUN");

    // CLOUD BASE is not in the store and is skipped rather than fatal.
    let names: Vec<&str> = routes[0].points.iter().map(|wp| wp.name.as_str()).collect();
    assert_eq!(names, vec!["MEADOW", "LANDING"]);
}

#[test]
fn test_route_point_before_header_is_fatal() {
    let db = FlightDb::new();
    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRRTS,0,2,1,MEADOW           "]);

    let mut session = session_with(port);
    assert!(matches!(session.routes(&db), Err(Error::Inconsistent(_))));
}

#[test]
fn test_write_waypoint_wire_bytes() {
    let (mut port, outbound) = MockPort::new();
    port.reply(&[XOFF]);
    port.reply(&[XON]);

    let mut session = session_with(port);
    let waypoint = Waypoint::new("MEADOW", 46.49235, 9.666_666_666_666_666, 2000);
    session.write_waypoint(&waypoint).unwrap();

    let expected = sentence::encode("PBRWPR,4629.541,N,00940.000,E,MEADOW           ,2000");
    assert_eq!(outbound.lock().unwrap().as_slice(), expected.as_bytes());
}

#[test]
fn test_write_waypoint_missing_xon() {
    let (mut port, _outbound) = MockPort::new();
    port.reply(&[XOFF]);
    port.reply(b"Q");

    let mut session = session_with(port);
    let waypoint = Waypoint::new("MEADOW", 46.49235, 9.666_666_666_666_666, 2000);
    match session.write_waypoint(&waypoint) {
        Err(Error::UnexpectedCharacter(byte)) => assert_eq!(byte, b'Q'),
        other => panic!("expected unexpected-character error, got {:?}", other),
    }
}

#[test]
fn test_write_route_wire_bytes() {
    let (mut port, outbound) = MockPort::new();
    for _ in 0..3 {
        port.reply(&[XOFF]);
        port.reply(&[XON]);
    }

    let mut route = Route::new(0, "EVENING RUN");
    route.append_point(Waypoint::new("MEADOW", 46.5, 9.7, 2000));
    route.append_point(Waypoint::new("LANDING", 46.4, 9.6, 550));

    let mut session = session_with(port);
    session.write_route(&route).unwrap();

    let mut expected = String::new();
    expected.push_str(&sentence::encode("PBRRTR,00,03,00,EVENING RUN      "));
    expected.push_str(&sentence::encode("PBRRTR,00,03,01,MEADOW           "));
    expected.push_str(&sentence::encode("PBRRTR,00,03,02,LANDING          "));
    assert_eq!(outbound.lock().unwrap().as_slice(), expected.as_bytes());
}

#[test]
fn test_download_assembles_the_store() {
    init_tracing();

    let (mut port, _outbound) = MockPort::new();
    // Scripted in the exact order the download walks: waypoints, routes,
    // identity, track list, then each track's detail.
    port.bracket(&[
        "PBRWPS,4629.541,N,00940.000,E,MEADOW           ,LANDING ZONE     ,2000",
        "PBRWPS,4624.000,N,00936.000,E,LANDING          ,FIELD            ,550",
    ]);
    port.bracket(&[
        "PBRRTS,0,3,0,EVENING RUN      ",
        "PBRRTS,0,3,1,MEADOW           ",
        "PBRRTS,0,3,2,LANDING          ",
    ]);
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);
    port.bracket(&["PBRTL,1,0,15.06.09,11:00:00,00:10:00"]);
    port.raw_bracket(&["HFDTE150609\r\n", "B1106554629397N00940468EA0177001807\r\n"]);

    let mut session = session_with(port);
    let db = session.download().unwrap();
    session.close().unwrap();

    assert_eq!(db.waypoints().len(), 2);
    assert_eq!(db.routes().len(), 1);
    assert_eq!(db.routes()[0].points.len(), 2);
    assert_eq!(db.tracks().len(), 1);
    assert_eq!(db.tracks()[0].name, "2009-06-15-FLY-42-01.IGC");
    assert_eq!(db.tracks()[0].points.len(), 1);
}

#[test]
fn test_upload_walks_waypoints_then_routes() {
    init_tracing();

    let mut db = FlightDb::new();
    db.add_waypoint(Waypoint::new("MEADOW", 46.49235, 9.666_666_666_666_666, 2000));
    let mut route = Route::new(0, "EVENING RUN");
    route.append_point(Waypoint::new("MEADOW", 46.49235, 9.666_666_666_666_666, 2000));
    db.add_route(route);

    let (mut port, outbound) = MockPort::new();
    for _ in 0..3 {
        port.reply(&[XOFF]);
        port.reply(&[XON]);
    }

    let mut session = session_with(port);
    session.upload(&db).unwrap();

    let mut expected = String::new();
    expected.push_str(&sentence::encode(
        "PBRWPR,4629.541,N,00940.000,E,MEADOW           ,2000",
    ));
    expected.push_str(&sentence::encode("PBRRTR,00,02,00,EVENING RUN      "));
    expected.push_str(&sentence::encode("PBRRTR,00,02,01,MEADOW           "));
    assert_eq!(outbound.lock().unwrap().as_slice(), expected.as_bytes());
}

#[test]
fn test_trace_sink_mirrors_traffic() {
    let trace = Arc::new(Mutex::new(Vec::new()));

    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);

    let mut session = session_with(port);
    session.set_trace_sink(Box::new(SharedSink(Arc::clone(&trace))));
    session.identity().unwrap();

    let trace = String::from_utf8(trace.lock().unwrap().clone()).unwrap();
    assert!(trace.starts_with("> $PBRSNP,*21\r\n"));
    assert!(trace.contains("< $PBRSNP,5030,MARY SODERSTROM,42,1.16*"));
}

#[test]
fn test_trace_sink_writes_to_a_file() {
    let file = tempfile::NamedTempFile::new().unwrap();

    let (mut port, _outbound) = MockPort::new();
    port.bracket(&["PBRSNP,5030,MARY SODERSTROM,42,1.16"]);

    let mut session = session_with(port);
    session.set_trace_sink(Box::new(file.reopen().unwrap()));
    session.identity().unwrap();

    let trace = std::fs::read_to_string(file.path()).unwrap();
    assert!(trace.starts_with("> $PBRSNP,*21\r\n"));
}
