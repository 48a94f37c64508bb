use std::net::TcpListener;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use tradebot::link::host::{serve, Arbiter, Mode};
use tradebot::link::{repeat_count, Buttons, ControllerCommand, ControllerSink, LinkClient};
use tradebot::link::NEUTRAL_REPORT;

fn toggle_override(arbiter: &Arbiter) {
    arbiter.human_button(Buttons::HOME, true);
    arbiter.human_button(Buttons::HOME, false);
}

#[test]
fn client_write_waits_out_human_override() -> tradebot::Result<()> {
    let arbiter = Arc::new(Arbiter::new());
    arbiter.set_enabled();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = {
        let arbiter = Arc::clone(&arbiter);
        std::thread::spawn(move || serve(listener, arbiter))
    };

    toggle_override(&arbiter);
    assert_eq!(arbiter.mode(), Mode::HumanOverride);

    let (done_tx, done_rx) = mpsc::channel();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let client = std::thread::spawn(move || -> tradebot::Result<()> {
        let mut client = LinkClient::connect_tcp(addr)?;
        client.send(&ControllerCommand::neutral().press(Buttons::A))?;
        let _ = done_tx.send(());
        let _ = stop_rx.recv();
        client.stop()?;
        Ok(())
    });

    // Held while the human owns the controller; nothing reaches the device.
    assert!(done_rx.recv_timeout(Duration::from_millis(150)).is_err());
    assert_eq!(arbiter.queued(), 0);

    toggle_override(&arbiter);
    done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(arbiter.mode(), Mode::Automated);
    assert_eq!(
        arbiter.next_report(),
        ControllerCommand::neutral().press(Buttons::A).to_report()
    );

    stop_tx.send(()).unwrap();
    client.join().unwrap()?;
    server.join().unwrap()?;
    assert!(arbiter.is_stopped());
    Ok(())
}

#[test]
fn timed_press_falls_back_to_last_sticky_state() -> tradebot::Result<()> {
    let arbiter = Arc::new(Arbiter::new());
    arbiter.set_enabled();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = {
        let arbiter = Arc::clone(&arbiter);
        std::thread::spawn(move || serve(listener, arbiter))
    };

    let hold = Duration::from_millis(50);
    let press = ControllerCommand::neutral().press(Buttons::B);
    let mut client = LinkClient::connect_tcp(addr)?;
    client.send(&press.hold(hold))?;
    client.stop()?;
    server.join().unwrap()?;

    for _ in 0..=repeat_count(hold) {
        assert_eq!(arbiter.next_report(), press.to_report());
    }
    assert_eq!(arbiter.next_report(), NEUTRAL_REPORT);
    assert_eq!(arbiter.next_report(), NEUTRAL_REPORT);
    Ok(())
}

#[test]
fn human_input_only_reaches_device_during_override() {
    let arbiter = Arbiter::new();
    arbiter.human_button(Buttons::Y, true);
    assert_eq!(arbiter.next_report(), NEUTRAL_REPORT);

    toggle_override(&arbiter);
    let held = arbiter.next_report();
    assert_eq!(u16::from_le_bytes([held[0], held[1]]), Buttons::Y.bits());

    arbiter.human_button(Buttons::Y, false);
    toggle_override(&arbiter);
    assert_eq!(arbiter.next_report(), NEUTRAL_REPORT);
}
