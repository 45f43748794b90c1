//! MQTT topic filters, used to narrow the live bridge.

/// Check whether `topic` matches the MQTT subscription `filter`.
///
/// `+` matches exactly one level; `#` matches the remaining levels,
/// including none (so `a/#` matches `a`).
pub fn matches(filter: &str, topic: &str) -> bool {
  let mut levels = topic.split('/');

  for part in filter.split('/') {
    match (part, levels.next()) {
      ("#", _) => return true,
      ("+", Some(_)) => {}
      (exact, Some(level)) if exact == level => {}
      _ => return false,
    }
  }

  levels.next().is_none()
}

#[cfg(test)]
mod tests {
  use super::matches;

  #[test]
  fn exact() {
    assert!(matches("sensors/temp", "sensors/temp"));
    assert!(!matches("sensors/temp", "sensors/humidity"));
    assert!(!matches("sensors/temp", "sensors/temp/x"));
    assert!(!matches("sensors/temp/x", "sensors/temp"));
  }

  #[test]
  fn single_level_wildcard() {
    assert!(matches("tele/+/SENSOR", "tele/plug1/SENSOR"));
    assert!(!matches("tele/+/SENSOR", "tele/a/b/SENSOR"));
    assert!(!matches("tele/+", "tele"));
  }

  #[test]
  fn multi_level_wildcard() {
    assert!(matches("#", "anything/at/all"));
    assert!(matches("zigbee2mqtt/#", "zigbee2mqtt/kitchen/motion"));
    assert!(matches("zigbee2mqtt/#", "zigbee2mqtt"));
    assert!(!matches("zigbee2mqtt/#", "tele/plug"));
  }
}
