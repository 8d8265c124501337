use orion_core::{CommandType, TelemetryType};
use rumqttc::QoS;

/// MQTT topic an edge device publishes telemetry on.
pub fn telemetry_topic(device_id: &str) -> String {
    format!("orion/edge/{device_id}/telemetry")
}

/// MQTT topic an edge device publishes health heartbeats on.
pub fn health_topic(device_id: &str) -> String {
    format!("orion/edge/{device_id}/health")
}

/// MQTT topic commands for a device are mirrored on.
pub fn command_topic(device_id: &str) -> String {
    format!("orion/edge/{device_id}/cmd/#")
}

/// QoS for a telemetry sample: 0 for high-frequency data, no delivery
/// guarantee needed.
pub fn telemetry_qos(_telemetry_type: TelemetryType) -> QoS {
    QoS::AtMostOnce
}

/// QoS for a health heartbeat: must be delivered for watchdog semantics to
/// hold, so at-least-once.
pub fn health_qos() -> QoS {
    QoS::AtLeastOnce
}

/// QoS for a command: emergency stop gets exactly-once; every other
/// movement command gets at-least-once.
pub fn command_qos(command_type: CommandType) -> QoS {
    match command_type {
        CommandType::Stop => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_namespaced_per_device() {
        assert_eq!(telemetry_topic("bot-1"), "orion/edge/bot-1/telemetry");
        assert_eq!(health_topic("bot-1"), "orion/edge/bot-1/health");
        assert_eq!(command_topic("bot-1"), "orion/edge/bot-1/cmd/#");
    }

    #[test]
    fn telemetry_is_at_most_once() {
        assert_eq!(telemetry_qos(TelemetryType::Position), QoS::AtMostOnce);
    }

    #[test]
    fn health_is_at_least_once() {
        assert_eq!(health_qos(), QoS::AtLeastOnce);
    }

    #[test]
    fn emergency_stop_is_exactly_once() {
        assert_eq!(command_qos(CommandType::Stop), QoS::ExactlyOnce);
    }

    #[test]
    fn movement_commands_are_at_least_once() {
        assert_eq!(command_qos(CommandType::Move), QoS::AtLeastOnce);
    }
}
