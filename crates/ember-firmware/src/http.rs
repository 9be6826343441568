//! HTTP workers serving the status page and `/sensors`
//!
//! Each worker owns one socket and handles one connection at a time; routing
//! and formatting live in `ember_core::status`.

use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_net::tcp::{Error as TcpError, TcpSocket};
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::Write;
use log::{debug, info, warn};

use ember_core::SnapshotCell;
use ember_core::error::PeripheralInitFault;
use ember_core::status::Response;

pub const HTTP_PORT: u16 = 80;

/// Two workers so the page load and its first poll do not queue
pub const HTTP_WORKER_COUNT: usize = 2;

const MAX_REQUEST_SIZE: usize = 512;
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

pub fn spawn_workers(
    spawner: &Spawner,
    stack: Stack<'static>,
    snapshot: &'static SnapshotCell,
) -> Result<(), PeripheralInitFault> {
    for id in 0..HTTP_WORKER_COUNT {
        let token = http_worker(stack, snapshot, id).map_err(|_| PeripheralInitFault::Network {
            details: "HTTP worker could not be spawned",
        })?;
        spawner.spawn(token);
    }
    info!("{} HTTP workers on port {}", HTTP_WORKER_COUNT, HTTP_PORT);
    Ok(())
}

#[embassy_executor::task(pool_size = HTTP_WORKER_COUNT)]
async fn http_worker(stack: Stack<'static>, snapshot: &'static SnapshotCell, id: usize) {
    let mut rx_buf = [0u8; 1024];
    let mut tx_buf = [0u8; 2048];

    loop {
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        match socket.accept(HTTP_PORT).await {
            Ok(()) => {
                if let Err(e) = handle_connection(&mut socket, snapshot).await {
                    warn!("HTTP worker {}: connection error: {:?}", id, e);
                }
            }
            Err(e) => {
                warn!("HTTP worker {}: accept failed: {:?}", id, e);
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.close();
        let _ = socket.flush().await;
        socket.abort();
    }
}

async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    snapshot: &SnapshotCell,
) -> Result<(), TcpError> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0;

    // Read until the end of headers or the buffer is full
    loop {
        let n = socket.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
        if total >= MAX_REQUEST_SIZE || buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    if total == 0 {
        return Ok(());
    }

    let response = Response::for_request(
        &buf[..total],
        &snapshot.latest(),
        Instant::now().as_millis(),
    );
    debug!("HTTP {}", response.status);

    socket.write_all(response.head().as_bytes()).await?;
    socket.write_all(response.body.as_bytes()).await?;
    socket.flush().await
}
