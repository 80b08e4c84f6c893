//! Example feeding decoded timer frames into a StatsEngine.
//!
//! Run with: cargo run --example timer_session

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use timestat::config::StatsConfig;
use timestat::device::{
    RecordedTime, TimerEvent, TimerLink, TimerSession, TimerState, encode_frame,
};
use timestat::engine::StatsEngine;

/// Stands in for a real transport.
struct SimulatedLink;

impl TimerLink for SimulatedLink {
    type Error = Infallible;

    fn connect(&mut self) -> Result<(), Infallible> {
        println!("   link connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Infallible> {
        println!("   link closed");
        Ok(())
    }
}

fn main() -> Result<(), Infallible> {
    println!("=== Timer Session Example ===\n");

    let times: Rc<RefCell<Vec<i64>>> = Rc::default();
    let sink = Rc::clone(&times);
    let mut session = TimerSession::open(SimulatedLink, move |event: &TimerEvent| {
        println!("   state: {:?}", event.state);
        if let Some(time) = event.recorded_time {
            println!("   recorded {time}");
            sink.borrow_mut().push(time.total_millis());
        }
    })?;

    let mut engine = StatsEngine::new(StatsConfig::default());

    let solves = [
        RecordedTime::new(0, 11, 204),
        RecordedTime::new(0, 10, 877),
        RecordedTime::new(0, 12, 15),
        RecordedTime::new(0, 9, 932),
        RecordedTime::new(0, 10, 410),
    ];
    for time in solves {
        for state in [TimerState::HandsOn, TimerState::GetSet, TimerState::Running] {
            let _ = session.on_notification(&encode_frame(state, None));
        }
        if session
            .on_notification(&encode_frame(TimerState::Stopped, Some(time)))
            .is_err()
        {
            continue;
        }
        if let Some(event) = engine.append(&*times.borrow()) {
            println!("   >> {event}");
        }
    }

    // A corrupted frame is logged and dropped.
    let mut bad = encode_frame(TimerState::Stopped, Some(RecordedTime::new(0, 1, 0)));
    bad[5] ^= 0x40;
    if let Err(e) = session.on_notification(&bad) {
        println!("   rejected: {e}");
    }

    session.close().map_err(|(_, e)| e)?;

    println!();
    println!("Readings: {:?}", times.borrow());
    if let Some(ao5) = engine.current_window(1) {
        println!("ao5: {ao5}");
    }
    Ok(())
}
