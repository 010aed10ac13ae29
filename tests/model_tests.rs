use content_board::models::{
    AnnouncementRecord, ResourceRecord, canonical_date, filter_announcements, filter_resources,
    sort_announcements,
};

fn announcement(id: &str, pinned: bool, date: Option<&str>) -> AnnouncementRecord {
    AnnouncementRecord {
        id: id.to_string(),
        title: format!("Title {id}"),
        body: String::new(),
        date: date.map(str::to_string),
        pinned,
    }
    .normalized()
}

fn ids(items: &[AnnouncementRecord]) -> Vec<&str> {
    items.iter().map(|a| a.id.as_str()).collect()
}

#[cfg(test)]
mod date_tests {
    use super::*;

    #[test]
    fn test_bare_date_becomes_midnight_utc() {
        assert_eq!(canonical_date("2024-03-01"), "2024-03-01T00:00:00.000Z");
    }

    #[test]
    fn test_offset_timestamp_converted_to_utc() {
        assert_eq!(
            canonical_date("2024-03-01T10:15:00+02:00"),
            "2024-03-01T08:15:00.000Z"
        );
    }

    #[test]
    fn test_unparseable_date_kept_verbatim() {
        assert_eq!(canonical_date("next tuesday"), "next tuesday");
    }

    #[test]
    fn test_blank_date_normalizes_to_absent() {
        let record = announcement("a", false, Some("   "));
        assert_eq!(record.date, None);
    }
}

#[cfg(test)]
mod ordering_tests {
    use super::*;

    #[test]
    fn test_pinned_first_then_newest_first() {
        let mut items = vec![
            announcement("old", false, Some("2023-01-01")),
            announcement("undated", false, None),
            announcement("pinned-old", true, Some("2022-06-01")),
            announcement("new", false, Some("2024-05-01")),
            announcement("pinned-new", true, Some("2024-01-01")),
        ];

        sort_announcements(&mut items);

        assert_eq!(
            ids(&items),
            vec!["pinned-new", "pinned-old", "new", "old", "undated"]
        );
    }

    #[test]
    fn test_no_unpinned_precedes_pinned_and_dates_non_increasing() {
        let mut items = vec![
            announcement("a", false, Some("2024-02-01")),
            announcement("b", true, Some("2021-01-01")),
            announcement("c", false, Some("2024-03-01T12:00:00Z")),
            announcement("d", true, Some("2023-07-07")),
            announcement("e", false, Some("2020-12-31")),
        ];

        sort_announcements(&mut items);

        let first_unpinned = items.iter().position(|a| !a.pinned).unwrap();
        assert!(items[first_unpinned..].iter().all(|a| !a.pinned));

        for pair in items.windows(2) {
            if pair[0].pinned == pair[1].pinned {
                assert!(pair[0].date >= pair[1].date, "{:?} before {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn test_equal_keys_keep_source_order() {
        let mut items = vec![
            announcement("first", false, Some("2024-01-01")),
            announcement("second", false, Some("2024-01-01")),
            announcement("third", false, Some("2024-01-01")),
        ];

        sort_announcements(&mut items);

        assert_eq!(ids(&items), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unparseable_date_sorts_after_parseable() {
        let mut items = vec![
            announcement("garbled", false, Some("sometime")),
            announcement("dated", false, Some("2019-01-01")),
        ];

        sort_announcements(&mut items);

        assert_eq!(ids(&items), vec!["dated", "garbled"]);
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;

    #[test]
    fn test_resource_without_link_defaults_to_hash() {
        let record: ResourceRecord =
            serde_json::from_str(r#"{"id":"r1","title":"Guide","type":"doc","description":"d"}"#)
                .unwrap();
        assert_eq!(record.link, "#");
        assert_eq!(record.kind, "doc");
    }

    #[test]
    fn test_blank_link_normalizes_to_hash() {
        let record = ResourceRecord {
            link: "  ".to_string(),
            ..Default::default()
        }
        .normalized();
        assert_eq!(record.link, "#");
    }

    #[test]
    fn test_resource_serializes_kind_as_type() {
        let record = ResourceRecord {
            id: "r1".to_string(),
            kind: "video".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "video");
        assert!(json.get("kind").is_none());
    }
}

#[cfg(test)]
mod search_tests {
    use super::*;

    #[test]
    fn test_announcement_search_is_case_insensitive() {
        let items = vec![
            AnnouncementRecord {
                id: "1".to_string(),
                title: "Lab Hours".to_string(),
                body: "Room 204".to_string(),
                ..Default::default()
            },
            AnnouncementRecord {
                id: "2".to_string(),
                title: "Deadline".to_string(),
                body: "Submit via the LAB portal".to_string(),
                ..Default::default()
            },
            AnnouncementRecord {
                id: "3".to_string(),
                title: "Holiday".to_string(),
                body: "Closed".to_string(),
                ..Default::default()
            },
        ];

        let hits = filter_announcements(&items, "lab");
        assert_eq!(ids(&hits), vec!["1", "2"]);
    }

    #[test]
    fn test_resource_search_covers_type() {
        let items = vec![
            ResourceRecord {
                id: "1".to_string(),
                title: "Intro".to_string(),
                kind: "Video".to_string(),
                ..Default::default()
            },
            ResourceRecord {
                id: "2".to_string(),
                title: "Style guide".to_string(),
                kind: "pdf".to_string(),
                ..Default::default()
            },
        ];

        let hits = filter_resources(&items, "VIDEO");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }
}
