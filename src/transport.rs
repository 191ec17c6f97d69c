//! Serial transport — the external collaborator named in spec.md §1/§6.
//!
//! The protocol engine only requires a bidirectional byte stream; this
//! module supplies the obvious default (a real serial port at 2400 8-N-1)
//! but `Session::start` accepts anything satisfying `Transport`, including
//! an in-memory `tokio::io::duplex` pair in tests.

use tokio::io::{AsyncRead, AsyncWrite};

/// Anything the driver loop can read from and the request methods can write
/// to. Implemented for any `AsyncRead + AsyncWrite` pair, e.g. `tokio_serial::SerialStream`
/// or one half of `tokio::io::duplex`.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Transport for T {}

#[cfg(feature = "serial")]
pub mod serial {
    //! Opens the real MK2/MK3 USB-serial adapter. Mirrors the original
    //! driver's `serial_asyncio.open_serial_connection(url=path, baudrate=2400,
    //! parity=PARITY_NONE, stopbits=STOPBITS_ONE)`.

    use tokio_serial::{SerialPortBuilderExt, SerialStream};

    /// Opens `path` at 2400 baud, 8 data bits, no parity, 1 stop bit — the
    /// line parameters the MK2/MK3 adapter requires (spec.md §6).
    pub fn open(path: &str) -> std::io::Result<SerialStream> {
        tokio_serial::new(path, 2400).open_native_async()
    }
}
