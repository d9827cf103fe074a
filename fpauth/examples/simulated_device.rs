//! Device session with a simulated sensor, served over TCP
//!
//! Accepts one host at a time on 127.0.0.1:7000. The simulated finger
//! goes down and up every few ticks, so enroll and verify complete on
//! their own.

use std::net::TcpListener;

use fpauth::{DeviceSession, FrameTransport, Sensor, SensorError, TcpChannel, UserId};
use tracing_subscriber::EnvFilter;

/// Sensor with a finger that comes and goes
#[derive(Default)]
struct SimulatedSensor {
    powered: bool,
    polls: u32,
    templates: Vec<UserId>,
}

impl Sensor for SimulatedSensor {
    fn enable(&mut self) {
        tracing::info!("Sensor on");
        self.powered = true;
        self.polls = 0;
    }

    fn disable(&mut self) {
        tracing::info!("Sensor off");
        self.powered = false;
    }

    fn is_touched(&mut self) -> bool {
        self.polls += 1;
        (self.polls / 5) % 2 == 1
    }

    fn enroll_stage(&mut self, stage: u8) -> Result<(), SensorError> {
        if !self.powered {
            return Err(SensorError::NotConnected);
        }
        tracing::info!(stage, "Captured");
        Ok(())
    }

    fn enroll_finalize(&mut self) -> Result<UserId, SensorError> {
        let id = UserId(self.templates.len() as u16 + 1);
        self.templates.push(id);
        Ok(id)
    }

    fn identify(&mut self) -> Result<Option<UserId>, SensorError> {
        if !self.powered {
            return Err(SensorError::NotConnected);
        }
        Ok(self.templates.first().copied())
    }

    fn delete_all(&mut self) -> Result<(), SensorError> {
        self.templates.clear();
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> fpauth::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let listener = TcpListener::bind("127.0.0.1:7000").map_err(open_error)?;
    println!("Simulated device listening on 127.0.0.1:7000");

    let mut sensor = SimulatedSensor::default();

    loop {
        let (stream, peer) = listener.accept().map_err(open_error)?;
        println!("✓ Host connected from {}", peer);

        let channel = TcpChannel::from_stream(stream)?;
        let mut session = DeviceSession::new(FrameTransport::new(channel), sensor);

        if let Err(e) = session.run().await {
            println!("Session ended: {}", e);
        }

        sensor = session.into_sensor();
    }
}

fn open_error(e: std::io::Error) -> fpauth::Error {
    fpauth::Error::Open(e.to_string())
}
