use embassy_net::{
    dns::{DnsQueryType, Error as DnsError},
    tcp::{ConnectError, Error as TcpError, TcpSocket},
    IpAddress, Stack,
};
use embassy_time::{Duration, Timer};
use embedded_io_async::{ErrorType, Read, ReadReady, Write};
use parking_node_core::config::parse_ipv4;

use crate::constants::SOCKET_TIMEOUT_SECS;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug)]
pub enum Error {
    #[allow(dead_code)]
    DnsQueryFailed(DnsError),
    DnsLookupFailed,
    #[allow(dead_code)]
    SocketConnectionError(ConnectError),
}

/// Plain TCP session to the broker.
pub struct Transport<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> Transport<'a> {
    /// Resolve `hostname` and open a TCP connection, retrying a few times.
    pub async fn connect(
        stack: Stack<'static>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        hostname: &str,
        port: u16,
    ) -> Result<Self, Error> {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

        let mut attempt = 0;
        loop {
            attempt += 1;
            match open(stack, &mut socket, hostname, port).await {
                Ok(()) => {
                    log::info!("TCP connected to {}:{}", hostname, port);
                    return Ok(Self { socket });
                }
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!(
                        "TCP connect attempt {}/{} to {}:{} failed: {:?}",
                        attempt,
                        MAX_RETRIES,
                        hostname,
                        port,
                        e
                    );
                    socket.abort();
                    Timer::after(Duration::from_millis(RETRY_DELAY_MS)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn open(
    stack: Stack<'static>,
    socket: &mut TcpSocket<'_>,
    hostname: &str,
    port: u16,
) -> Result<(), Error> {
    let addr = resolve(stack, hostname).await?;
    log::info!("Connecting TCP socket to {}:{}", addr, port);
    socket
        .connect((addr, port))
        .await
        .map_err(Error::SocketConnectionError)
}

async fn resolve(stack: Stack<'static>, hostname: &str) -> Result<IpAddress, Error> {
    if let Some([a, b, c, d]) = parse_ipv4(hostname) {
        return Ok(IpAddress::v4(a, b, c, d));
    }

    stack
        .dns_query(hostname, DnsQueryType::A)
        .await
        .map_err(Error::DnsQueryFailed)?
        .first()
        .copied()
        .ok_or(Error::DnsLookupFailed)
}

impl ErrorType for Transport<'_> {
    type Error = TcpError;
}

impl Read for Transport<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TcpError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.socket.read(buf).await {
                Ok(0) => {
                    log::debug!("Transport read: connection closed by peer");
                    return Ok(0);
                }
                Ok(n) => {
                    log::trace!("Transport read: {} bytes", n);
                    return Ok(n);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!("Transport read attempt {} failed: {:?}", attempt, e)
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl ReadReady for Transport<'_> {
    fn read_ready(&mut self) -> Result<bool, TcpError> {
        // Also true once the peer closed, so the next read reports EOF
        self.socket.read_ready()
    }
}

impl Write for Transport<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, TcpError> {
        let mut attempt = 0;
        let n = loop {
            attempt += 1;
            match self.socket.write(buf).await {
                Ok(n) => break n,
                Err(e) if attempt < MAX_RETRIES => {
                    log::warn!("Transport write attempt {} failed: {:?}", attempt, e)
                }
                Err(e) => return Err(e),
            }
        };
        // rust-mqtt never calls flush(); push every packet out right away
        self.socket.flush().await?;
        log::trace!("Transport write: {} bytes sent", n);
        Ok(n)
    }

    async fn flush(&mut self) -> Result<(), TcpError> {
        self.socket.flush().await
    }
}
