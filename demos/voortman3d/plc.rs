use snafu::Snafu;
use std::{collections::HashMap, mem};

#[cfg(feature = "twincat")]
pub use self::twincat::AdsClient;

pub const DEFAULT_PORT: u16 = 851;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("PLC support is not compiled in, enable the 'twincat' feature"))]
    Offline,

    #[snafu(display("The PLC port is not open"))]
    NotConnected,

    #[snafu(display("PLC transport error: {}", message))]
    Transport { message: String },
}

/// The vendor seam of the bridge. Implementations talk to an automation
/// runtime that resolves symbol names to opaque handles.
pub trait SymbolClient {
    fn open(&mut self, port: u16) -> Result<()>;
    fn handle_by_name(&mut self, name: &str) -> Result<u32>;
    fn read_by_handle(&mut self, handle: u32, buffer: &mut [u8]) -> Result<()>;
    fn release_handle(&mut self, handle: u32) -> Result<()>;
    fn close(&mut self);
}

/// A value with a fixed little-endian wire size.
pub trait PlcValue: Sized {
    const SIZE: usize;
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_plc_value {
    ($($ty:ty),*) => {
        $(
            impl PlcValue for $ty {
                const SIZE: usize = mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0_u8; mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_plc_value!(f32, f64, i16, i32, u16, u32);

/// Caches symbol handles by a logical key and reads values through them.
///
/// Every failure leaves the bridge inert instead of surfacing an error, so
/// callers can poll it unconditionally. All cached handles are released
/// before the port closes.
pub struct PlcBridge<C: SymbolClient> {
    client: C,
    port: u16,
    connected: bool,
    handles: HashMap<u32, u32>,
}

impl<C: SymbolClient> PlcBridge<C> {
    pub fn new(client: C, port: u16) -> Self {
        Self {
            client,
            port,
            connected: false,
            handles: HashMap::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connect(&mut self) -> bool {
        if self.connected {
            return true;
        }
        match self.client.open(self.port) {
            Ok(()) => {
                log::info!("Connected to PLC on port {}", self.port);
                self.connected = true;
            }
            Err(error) => log::warn!("Failed to connect to PLC: {}", error),
        }
        self.connected
    }

    pub fn resolve_handle(&mut self, key: u32, name: &str) -> Option<u32> {
        if let Some(handle) = self.handles.get(&key) {
            return Some(*handle);
        }
        if !self.connected {
            return None;
        }
        match self.client.handle_by_name(name) {
            Ok(handle) => {
                log::debug!("Variable handle for '{}' is {}", name, handle);
                self.handles.insert(key, handle);
                Some(handle)
            }
            Err(error) => {
                log::warn!("Failed to resolve PLC variable '{}': {}", name, error);
                None
            }
        }
    }

    /// Overwrites `value` with the remote value. Returns false, leaving
    /// `value` untouched, when the key is unresolved or the read fails.
    pub fn read_value<T: PlcValue>(&mut self, key: u32, value: &mut T) -> bool {
        let handle = match self.handles.get(&key) {
            Some(handle) => *handle,
            None => return false,
        };
        let mut buffer = vec![0_u8; T::SIZE];
        match self.client.read_by_handle(handle, &mut buffer) {
            Ok(()) => {
                *value = T::from_le_slice(&buffer);
                true
            }
            Err(error) => {
                log::trace!("PLC read of handle {} failed: {}", handle, error);
                false
            }
        }
    }
}

impl<C: SymbolClient> Drop for PlcBridge<C> {
    fn drop(&mut self) {
        if !self.connected {
            return;
        }
        for (_, handle) in self.handles.drain() {
            if let Err(error) = self.client.release_handle(handle) {
                log::warn!("Failed to release PLC handle {}: {}", handle, error);
            }
        }
        self.client.close();
    }
}

/// Used when the binary is built without an automation transport.
#[derive(Default)]
pub struct OfflineClient;

impl SymbolClient for OfflineClient {
    fn open(&mut self, _port: u16) -> Result<()> {
        Err(Error::Offline)
    }

    fn handle_by_name(&mut self, _name: &str) -> Result<u32> {
        Err(Error::NotConnected)
    }

    fn read_by_handle(&mut self, _handle: u32, _buffer: &mut [u8]) -> Result<()> {
        Err(Error::NotConnected)
    }

    fn release_handle(&mut self, _handle: u32) -> Result<()> {
        Err(Error::NotConnected)
    }

    fn close(&mut self) {}
}

#[cfg(feature = "twincat")]
mod twincat {
    use super::{Error, Result, SymbolClient};
    use ads::{AmsAddr, AmsNetId, Client, Device, Source, Timeouts};
    use std::time::Duration;

    const SYMBOL_HANDLE_BY_NAME: u32 = 0xF003;
    const SYMBOL_VALUE_BY_HANDLE: u32 = 0xF005;
    const RELEASE_SYMBOL_HANDLE: u32 = 0xF006;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn transport_error(error: ads::Error) -> Error {
        Error::Transport {
            message: error.to_string(),
        }
    }

    /// Talks ADS to a TwinCAT router over TCP.
    pub struct AdsClient {
        router_address: String,
        ams_net_id: String,
        connection: Option<(Client, AmsAddr)>,
    }

    impl AdsClient {
        pub fn new(router_address: &str, ams_net_id: &str) -> Self {
            Self {
                router_address: router_address.to_string(),
                ams_net_id: ams_net_id.to_string(),
                connection: None,
            }
        }

        fn device(&self) -> Result<Device<'_>> {
            let (client, address) = self.connection.as_ref().ok_or(Error::NotConnected)?;
            Ok(client.device(*address))
        }
    }

    impl SymbolClient for AdsClient {
        fn open(&mut self, port: u16) -> Result<()> {
            let net_id: AmsNetId = self.ams_net_id.parse().map_err(|_| Error::Transport {
                message: format!("Invalid AMS net id '{}'", self.ams_net_id),
            })?;
            let client = Client::new(
                self.router_address.as_str(),
                Timeouts::new(TIMEOUT),
                Source::Request,
            )
            .map_err(transport_error)?;
            self.connection = Some((client, AmsAddr::new(net_id, port)));
            Ok(())
        }

        fn handle_by_name(&mut self, name: &str) -> Result<u32> {
            let mut symbol = name.as_bytes().to_vec();
            symbol.push(0);
            let mut handle = [0_u8; 4];
            self.device()?
                .write_read_exact(SYMBOL_HANDLE_BY_NAME, 0, &symbol, &mut handle)
                .map_err(transport_error)?;
            Ok(u32::from_le_bytes(handle))
        }

        fn read_by_handle(&mut self, handle: u32, buffer: &mut [u8]) -> Result<()> {
            self.device()?
                .read_exact(SYMBOL_VALUE_BY_HANDLE, handle, buffer)
                .map_err(transport_error)
        }

        fn release_handle(&mut self, handle: u32) -> Result<()> {
            self.device()?
                .write(RELEASE_SYMBOL_HANDLE, 0, &handle.to_le_bytes())
                .map_err(transport_error)
        }

        fn close(&mut self) {
            self.connection = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Open(u16),
        Resolve(String),
        Read(u32),
        Release(u32),
        Close,
    }

    struct ScriptedClient {
        symbols: HashMap<String, (u32, Vec<u8>)>,
        refuse_open: bool,
        fail_reads: bool,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl ScriptedClient {
        fn new(calls: Rc<RefCell<Vec<Call>>>) -> Self {
            let mut symbols = HashMap::new();
            symbols.insert(
                "MAIN.fSawHeight".to_string(),
                (7, 12.5_f32.to_le_bytes().to_vec()),
            );
            symbols.insert("MAIN.nCount".to_string(), (9, 42_i32.to_le_bytes().to_vec()));
            Self {
                symbols,
                refuse_open: false,
                fail_reads: false,
                calls,
            }
        }
    }

    impl SymbolClient for ScriptedClient {
        fn open(&mut self, port: u16) -> Result<()> {
            self.calls.borrow_mut().push(Call::Open(port));
            if self.refuse_open {
                return Err(Error::Offline);
            }
            Ok(())
        }

        fn handle_by_name(&mut self, name: &str) -> Result<u32> {
            self.calls.borrow_mut().push(Call::Resolve(name.to_string()));
            self.symbols
                .get(name)
                .map(|(handle, _)| *handle)
                .ok_or(Error::Transport {
                    message: format!("unknown symbol {}", name),
                })
        }

        fn read_by_handle(&mut self, handle: u32, buffer: &mut [u8]) -> Result<()> {
            self.calls.borrow_mut().push(Call::Read(handle));
            if self.fail_reads {
                return Err(Error::Transport {
                    message: "timeout".to_string(),
                });
            }
            let (_, bytes) = self
                .symbols
                .values()
                .find(|(symbol_handle, _)| *symbol_handle == handle)
                .ok_or(Error::NotConnected)?;
            buffer.copy_from_slice(&bytes[..buffer.len()]);
            Ok(())
        }

        fn release_handle(&mut self, handle: u32) -> Result<()> {
            self.calls.borrow_mut().push(Call::Release(handle));
            Ok(())
        }

        fn close(&mut self) {
            self.calls.borrow_mut().push(Call::Close);
        }
    }

    fn scripted_bridge() -> (PlcBridge<ScriptedClient>, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let bridge = PlcBridge::new(ScriptedClient::new(calls.clone()), DEFAULT_PORT);
        (bridge, calls)
    }

    #[test]
    fn connect_opens_the_port_once() {
        let (mut bridge, calls) = scripted_bridge();
        assert!(bridge.connect());
        assert!(bridge.connect());
        assert_eq!(calls.borrow().as_slice(), &[Call::Open(851)]);
    }

    #[test]
    fn handles_are_resolved_once_per_key() {
        let (mut bridge, calls) = scripted_bridge();
        bridge.connect();
        assert_eq!(bridge.resolve_handle(0, "MAIN.fSawHeight"), Some(7));
        assert_eq!(bridge.resolve_handle(0, "MAIN.fSawHeight"), Some(7));
        let resolves = calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Resolve(_)))
            .count();
        assert_eq!(resolves, 1);
    }

    #[test]
    fn reads_decode_little_endian_values() {
        let (mut bridge, _) = scripted_bridge();
        bridge.connect();
        bridge.resolve_handle(0, "MAIN.fSawHeight");
        bridge.resolve_handle(1, "MAIN.nCount");

        let mut saw_height = 0.0_f32;
        assert!(bridge.read_value(0, &mut saw_height));
        assert_eq!(saw_height, 12.5);

        let mut count = 0_i32;
        assert!(bridge.read_value(1, &mut count));
        assert_eq!(count, 42);
    }

    #[test]
    fn unresolved_keys_and_failed_reads_leave_the_value_alone() {
        let (mut bridge, calls) = scripted_bridge();
        bridge.connect();

        let mut value = 3.0_f32;
        assert!(!bridge.read_value(5, &mut value));
        assert_eq!(value, 3.0);
        assert!(!calls.borrow().iter().any(|call| matches!(call, Call::Read(_))));

        assert_eq!(bridge.resolve_handle(2, "MAIN.missing"), None);
        assert!(!bridge.read_value(2, &mut value));

        bridge.resolve_handle(0, "MAIN.fSawHeight");
        bridge.client.fail_reads = true;
        assert!(!bridge.read_value(0, &mut value));
        assert_eq!(value, 3.0);
    }

    #[test]
    fn refused_connection_keeps_the_bridge_inert() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut client = ScriptedClient::new(calls.clone());
        client.refuse_open = true;
        {
            let mut bridge = PlcBridge::new(client, DEFAULT_PORT);
            assert!(!bridge.connect());
            assert_eq!(bridge.resolve_handle(0, "MAIN.fSawHeight"), None);
        }
        assert_eq!(calls.borrow().as_slice(), &[Call::Open(851)]);
    }

    #[test]
    fn drop_releases_every_handle_before_closing() {
        let (mut bridge, calls) = scripted_bridge();
        bridge.connect();
        bridge.resolve_handle(0, "MAIN.fSawHeight");
        bridge.resolve_handle(1, "MAIN.nCount");
        drop(bridge);

        let calls = calls.borrow();
        let mut released = calls
            .iter()
            .filter_map(|call| match call {
                Call::Release(handle) => Some(*handle),
                _ => None,
            })
            .collect::<Vec<_>>();
        released.sort();
        assert_eq!(released, vec![7, 9]);
        assert_eq!(calls.last(), Some(&Call::Close));
    }

    #[test]
    fn offline_client_refuses_to_open() {
        let mut bridge = PlcBridge::new(OfflineClient::default(), DEFAULT_PORT);
        assert!(!bridge.connect());
        assert!(!bridge.is_connected());
    }
}
