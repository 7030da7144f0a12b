use std::collections::BTreeMap;

/// Свойства сообщения по имени.
pub type Properties = BTreeMap<String, String>;

pub fn events_topic(device_id: &str) -> String {
    // чтобы маршрутизация IoT Hub видела тело как JSON
    format!("devices/{}/messages/events/$.ct=application%2Fjson&$.ce=utf-8", device_id)
}

pub fn devicebound_prefix(device_id: &str) -> String {
    format!("devices/{}/messages/devicebound/", device_id)
}

pub fn devicebound_filter(device_id: &str) -> String {
    format!("{}#", devicebound_prefix(device_id))
}

/// Делит URL-кодированный property bag в конце C2D-топика
/// на `(application, system)` свойства.
pub fn parse_property_bag(bag: &str) -> (Properties, Properties) {
    let mut application = Properties::new();
    let mut system = Properties::new();

    for pair in bag.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        let value = decode(value);

        if is_system_property(&key) {
            system.insert(key, value);
        } else {
            application.insert(key, value);
        }
    }

    (application, system)
}

fn is_system_property(key: &str) -> bool {
    key.starts_with("$.") || key.starts_with("iothub-")
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
