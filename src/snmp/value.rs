use std::fmt;

use snmp2::Value;

/// Собственная копия значения varbind.
///
/// `snmp2::Value` заимствует буфер ответа сессии, поэтому значение копируется
/// сюда до следующего запроса.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Boolean(bool),
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// Копирует значение `snmp2`. Для PDU и составных значений `None`.
    pub fn from_snmp(value: &Value<'_>) -> Option<Self> {
        let owned = match value {
            Value::Boolean(b) => SnmpValue::Boolean(*b),
            Value::Integer(i) => SnmpValue::Integer(*i),
            Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
            Value::Null => SnmpValue::Null,
            Value::ObjectIdentifier(oid) => SnmpValue::ObjectIdentifier(oid.to_string()),
            Value::IpAddress(addr) => SnmpValue::IpAddress(*addr),
            Value::Counter32(c) => SnmpValue::Counter32(*c),
            Value::Unsigned32(g) => SnmpValue::Gauge32(*g),
            Value::Timeticks(t) => SnmpValue::TimeTicks(*t),
            Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
            Value::Counter64(c) => SnmpValue::Counter64(*c),
            Value::NoSuchObject => SnmpValue::NoSuchObject,
            Value::NoSuchInstance => SnmpValue::NoSuchInstance,
            Value::EndOfMibView => SnmpValue::EndOfMibView,
            _ => return None,
        };
        Some(owned)
    }

    /// Имя SMI-типа для исходящих событий.
    pub fn type_name(&self) -> &'static str {
        match self {
            SnmpValue::Boolean(_) => "Boolean",
            SnmpValue::Integer(_) => "Integer32",
            SnmpValue::OctetString(_) => "OctetString",
            SnmpValue::Null => "Null",
            SnmpValue::ObjectIdentifier(_) => "ObjectIdentifier",
            SnmpValue::IpAddress(_) => "IPAddress",
            SnmpValue::Counter32(_) => "Counter32",
            SnmpValue::Gauge32(_) => "Gauge32",
            SnmpValue::TimeTicks(_) => "TimeTicks",
            SnmpValue::Opaque(_) => "Opaque",
            SnmpValue::Counter64(_) => "Counter64",
            SnmpValue::NoSuchObject => "NoSuchObject",
            SnmpValue::NoSuchInstance => "NoSuchInstance",
            SnmpValue::EndOfMibView => "EndOfMibView",
        }
    }

    /// BER-тег типа.
    pub fn type_code(&self) -> u8 {
        match self {
            SnmpValue::Boolean(_) => 0x01,
            SnmpValue::Integer(_) => 0x02,
            SnmpValue::OctetString(_) => 0x04,
            SnmpValue::Null => 0x05,
            SnmpValue::ObjectIdentifier(_) => 0x06,
            SnmpValue::IpAddress(_) => 0x40,
            SnmpValue::Counter32(_) => 0x41,
            SnmpValue::Gauge32(_) => 0x42,
            SnmpValue::TimeTicks(_) => 0x43,
            SnmpValue::Opaque(_) => 0x44,
            SnmpValue::Counter64(_) => 0x46,
            SnmpValue::NoSuchObject => 0x80,
            SnmpValue::NoSuchInstance => 0x81,
            SnmpValue::EndOfMibView => 0x82,
        }
    }

    /// true для исключений SNMPv2 без данных.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Boolean(b) => write!(f, "{}", b),
            SnmpValue::Integer(i) => write!(f, "{}", i),
            SnmpValue::OctetString(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            SnmpValue::Null => Ok(()),
            SnmpValue::ObjectIdentifier(oid) => f.write_str(oid),
            SnmpValue::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            SnmpValue::Counter32(c) | SnmpValue::Gauge32(c) | SnmpValue::TimeTicks(c) => {
                write!(f, "{}", c)
            }
            SnmpValue::Opaque(bytes) => bytes.iter().try_for_each(|b| write!(f, "{:02x}", b)),
            SnmpValue::Counter64(c) => write!(f, "{}", c),
            SnmpValue::NoSuchObject => f.write_str("NoSuchObject"),
            SnmpValue::NoSuchInstance => f.write_str("NoSuchInstance"),
            SnmpValue::EndOfMibView => f.write_str("EndOfMibView"),
        }
    }
}

/// Один varbind из ответа, в порядке ответа.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub id: String,
    pub value: SnmpValue,
}

impl ResultEntry {
    pub fn new(id: impl Into<String>, value: SnmpValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}
