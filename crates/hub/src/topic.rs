//! Topic namespace: `node/<id>/<category>/<subkey>`.

// ---------------------------------------------------------------------------
// Address type
// ---------------------------------------------------------------------------

/// A parsed topic. Segments are borrowed from the original topic string.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TopicAddress<'a> {
    pub(crate) node_id: &'a str,
    pub(crate) category: &'a str,
    pub(crate) subkey: &'a str,
}

// ---------------------------------------------------------------------------
// Parse / build
// ---------------------------------------------------------------------------

/// Parse a topic of the form "node/<id>/<category>/<subkey>".
/// Any other shape (wrong prefix, wrong segment count, empty id) is `None`.
pub(crate) fn parse(topic: &str) -> Option<TopicAddress<'_>> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() == 4 && parts[0] == "node" && !parts[1].is_empty() {
        Some(TopicAddress {
            node_id: parts[1],
            category: parts[2],
            subkey: parts[3],
        })
    } else {
        None
    }
}

/// Build "node/<id>/<category>/<subkey>". Inverse of [`parse`] as long as
/// the segments contain no `/`.
pub(crate) fn build(node_id: &str, category: &str, subkey: &str) -> String {
    format!("node/{node_id}/{category}/{subkey}")
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- parse --------------------------------------------------------------

    #[test]
    fn parse_sensor_topic() {
        assert_eq!(
            parse("node/living-room/sensor/moisture"),
            Some(TopicAddress {
                node_id: "living-room",
                category: "sensor",
                subkey: "moisture",
            })
        );
    }

    #[test]
    fn parse_pump_status_topic() {
        assert_eq!(
            parse("node/n1/pump/status"),
            Some(TopicAddress {
                node_id: "n1",
                category: "pump",
                subkey: "status",
            })
        );
    }

    #[test]
    fn parse_wrong_prefix() {
        assert_eq!(parse("probe/n1/sensor/moisture"), None);
    }

    #[test]
    fn parse_too_few_segments() {
        assert_eq!(parse("node/n1/sensor"), None);
    }

    #[test]
    fn parse_too_many_segments() {
        assert_eq!(parse("node/n1/sensor/moisture/extra"), None);
    }

    #[test]
    fn parse_empty_node_id() {
        assert_eq!(parse("node//sensor/moisture"), None);
    }

    #[test]
    fn parse_empty_string() {
        assert_eq!(parse(""), None);
    }

    #[test]
    fn parse_unknown_category_still_parses() {
        // Shape is valid; classification happens at the router.
        let addr = parse("node/n1/relay/state").unwrap();
        assert_eq!(addr.category, "relay");
        assert_eq!(addr.subkey, "state");
    }

    // -- build --------------------------------------------------------------

    #[test]
    fn build_command_topic() {
        assert_eq!(build("n1", "pump", "command"), "node/n1/pump/command");
    }

    #[test]
    fn build_led_topic() {
        assert_eq!(build("kitchen", "led", "toggle"), "node/kitchen/led/toggle");
    }

    // -- round trip ---------------------------------------------------------

    #[test]
    fn build_then_parse_round_trips() {
        for id in ["n1", "living-room", "greenhouse_2", "a"] {
            let topic = build(id, "sensor", "moisture");
            let addr = parse(&topic).unwrap();
            assert_eq!(addr.node_id, id);
            assert_eq!(addr.category, "sensor");
            assert_eq!(addr.subkey, "moisture");
        }
    }
}
