//! End-to-end tests driving communicators through a recording channel.

use std::sync::Arc;

use horizon_dataflow::communicator::{
    ClientCommand, CommunicatorBuilder, DataCommunicator, DataGenerator, DataKeyMapper,
    HierarchicalDataCommunicator, HierarchyMapper, KeyMapper, RecordingChannel, RowRecord,
    ServerCommand, fields,
};
use horizon_dataflow::provider::{
    AnyDataProvider, ListDataProvider, Predicate, SimpleHierarchicalDataProvider, TreeData,
    TreeDataProvider,
};
use horizon_dataflow::Result;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

type Letters = Arc<DataCommunicator<&'static str, Predicate<&'static str>>>;

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn letters(min_push_size: usize, items: Vec<&'static str>) -> (Letters, Arc<RecordingChannel>) {
    setup();
    let channel = Arc::new(RecordingChannel::new());
    let communicator: Letters = CommunicatorBuilder::new()
        .min_push_size(min_push_size)
        .build(channel.clone());
    communicator.set_data_provider(AnyDataProvider::flat(ListDataProvider::new(items)), None);
    communicator.attach();
    (communicator, channel)
}

fn pushed_items(communicator: &Letters, records: &[RowRecord]) -> Vec<&'static str> {
    records
        .iter()
        .filter_map(|record| record[fields::KEY].as_str())
        .filter_map(|key| communicator.item_for_key(key))
        .collect()
}

/// Logs every lifecycle call in order.
#[derive(Default)]
struct Journal {
    events: Mutex<Vec<String>>,
}

impl Journal {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl DataGenerator<&'static str> for Journal {
    fn generate_data(&self, item: &&'static str, _record: &mut RowRecord) -> Result<()> {
        self.events.lock().push(format!("generate {item}"));
        Ok(())
    }

    fn destroy_data(&self, item: &&'static str) {
        self.events.lock().push(format!("destroy {item}"));
    }

    fn destroy_all_data(&self) {
        self.events.lock().push("destroy all".to_string());
    }
}

#[test]
fn test_first_response_resets_and_pushes_min_window() {
    let (communicator, channel) = letters(2, vec!["A", "B", "C", "D", "E"]);
    communicator.before_client_response(true).unwrap();

    let commands = channel.take();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0], ClientCommand::Reset { size: 5 });
    let ClientCommand::SetData {
        first_index,
        records,
    } = &commands[1]
    else {
        panic!("expected set data, got {commands:?}");
    };
    assert_eq!(*first_index, 0);
    assert_eq!(pushed_items(&communicator, records), vec!["A", "B"]);
}

#[test]
fn test_refreshing_an_inactive_item_is_ignored() {
    let (communicator, channel) = letters(2, vec!["A", "B", "C", "D", "E"]);
    communicator.before_client_response(true).unwrap();
    channel.take();

    communicator.refresh(&"E");
    assert!(!communicator.is_dirty());
    communicator.before_client_response(false).unwrap();
    assert!(channel.take().is_empty());
}

#[test]
fn test_replacing_the_provider_destroys_everything_first() {
    let (communicator, channel) = letters(2, vec!["A", "B", "C"]);
    let journal = Arc::new(Journal::default());
    communicator.add_data_generator(journal.clone());
    communicator.before_client_response(true).unwrap();
    channel.take();
    assert_eq!(journal.events(), vec!["generate A", "generate B"]);

    communicator.set_data_provider(
        AnyDataProvider::flat(ListDataProvider::new(vec!["X", "Y", "Z", "W"])),
        None,
    );
    assert_eq!(journal.events().last().map(String::as_str), Some("destroy all"));
    assert!(communicator.active_items().is_empty());

    communicator.before_client_response(false).unwrap();
    let commands = channel.take();
    assert_eq!(commands[0], ClientCommand::Reset { size: 4 });
    let ClientCommand::SetData { records, .. } = &commands[1] else {
        panic!("expected set data, got {commands:?}");
    };
    assert_eq!(pushed_items(&communicator, records), vec!["X", "Y"]);
    assert_eq!(
        journal.events()[2..],
        ["destroy all", "generate X", "generate Y"]
    );
}

#[test]
fn test_window_past_the_end_escalates_to_reset() {
    let (communicator, channel) = letters(2, vec!["A", "B", "C", "D", "E"]);
    communicator.before_client_response(true).unwrap();
    channel.take();

    assert!(communicator.fetch_items_with_range(10, 10).unwrap().is_empty());

    let request = concat!(
        r#"{"type":"requestRows","firstRowIndex":10,"numberOfRows":10,"#,
        r#""firstCachedRowIndex":0,"cacheSize":2}"#,
    );
    communicator.handle_client_command(ServerCommand::from_json(request).unwrap());
    communicator.before_client_response(false).unwrap();
    assert!(channel.take().is_empty());
    assert!(communicator.is_dirty());

    communicator.before_client_response(false).unwrap();
    assert_eq!(channel.take(), vec![ClientCommand::Reset { size: 5 }]);
    assert!(!communicator.is_dirty());
}

#[test]
fn test_short_last_page_does_not_escalate() {
    let (communicator, channel) = letters(2, vec!["A", "B", "C", "D", "E"]);
    communicator.before_client_response(true).unwrap();
    channel.take();

    communicator.on_request_rows(3, 10, 0, 2);
    communicator.before_client_response(false).unwrap();
    let commands = channel.take();
    let [ClientCommand::SetData { first_index, records }] = commands.as_slice() else {
        panic!("expected set data, got {commands:?}");
    };
    assert_eq!(*first_index, 3);
    assert_eq!(pushed_items(&communicator, records), vec!["D", "E"]);
    assert!(!communicator.is_dirty());
}

#[test]
fn test_repushing_a_dropped_row_keeps_its_data() {
    let (communicator, channel) = letters(3, vec!["A", "B", "C", "D"]);
    let journal = Arc::new(Journal::default());
    communicator.add_data_generator(journal.clone());
    communicator.before_client_response(true).unwrap();
    channel.take();

    let key_a = communicator.key_of(&"A").unwrap();
    communicator.on_drop_rows(&[key_a.clone()]);
    communicator.on_request_rows(0, 2, 0, 2);
    communicator.before_client_response(false).unwrap();

    assert!(!journal.events().iter().any(|event| event.starts_with("destroy")));
    assert_eq!(communicator.key_of(&"A"), Some(key_a));
    assert_eq!(communicator.dropped_count(), 0);
}

#[test]
fn test_keys_are_stable_and_never_reused() {
    let keys: KeyMapper<&'static str> = KeyMapper::new();
    let a = keys.key(&"A");
    let b = keys.key(&"B");
    assert_eq!(keys.key(&"A"), a);
    assert_ne!(a, b);

    keys.remove(&"A");
    let again = keys.key(&"A");
    assert_ne!(again, a);
    assert_ne!(again, b);
    assert_eq!(keys.get(&b), Some("B"));
}

#[test]
fn test_tree_expand_and_collapse_report_row_ranges() {
    setup();
    let mut data = TreeData::new();
    data.add_root_items(["P1", "P2"]).unwrap();
    data.add_items(Some(&"P1"), ["C1", "C2"]).unwrap();
    let provider = Arc::new(TreeDataProvider::new(data));

    let mapper: HierarchyMapper<&'static str, Predicate<&'static str>> =
        HierarchyMapper::new(provider);
    assert_eq!(mapper.tree_size().unwrap(), 2);

    let inserted = mapper.expand(&"P1", Some(0)).unwrap();
    assert_eq!((inserted.start(), inserted.end()), (1, 3));
    assert_eq!(mapper.tree_size().unwrap(), 4);

    let removed = mapper.collapse(&"P1", Some(0)).unwrap();
    assert_eq!((removed.start(), removed.end()), (1, 3));
    assert_eq!(mapper.tree_size().unwrap(), 2);
}

#[test]
fn test_expand_then_collapse_restores_tree_size() {
    let provider = SimpleHierarchicalDataProvider::new(|parent: Option<&u32>| {
        Some(match parent {
            None => vec![1, 2, 3],
            Some(n) if *n < 100 => (1..=3).map(|i| n * 10 + i).collect(),
            Some(_) => Vec::new(),
        })
    });
    let mapper: HierarchyMapper<u32, Predicate<u32>> = HierarchyMapper::new(Arc::new(provider));

    for node in [2, 21, 212, 3] {
        let position = mapper.index_of(&node).unwrap();
        let before = mapper.tree_size().unwrap();

        let inserted = mapper.expand(&node, position).unwrap();
        let after = mapper.tree_size().unwrap();
        // Nodes deeper than two levels are leaves.
        let visible = if node < 100 { 3 } else { 0 };
        assert_eq!(after, before + visible);
        assert_eq!(inserted.length(), visible);

        mapper.collapse(&node, position).unwrap();
        assert_eq!(mapper.tree_size().unwrap(), before);
        mapper.expand(&node, position).unwrap();
    }
}

#[test]
fn test_hierarchical_communicator_streams_children() {
    setup();
    let mut data = TreeData::new();
    data.add_root_items(["P1", "P2"]).unwrap();
    data.add_items(Some(&"P1"), ["C1", "C2"]).unwrap();

    let channel = Arc::new(RecordingChannel::new());
    let tree: HierarchicalDataCommunicator<&'static str, Predicate<&'static str>> =
        CommunicatorBuilder::new().build_hierarchical(channel.clone());
    tree.set_data_provider(AnyDataProvider::hierarchical(TreeDataProvider::new(data)), None)
        .unwrap();
    tree.attach();
    tree.before_client_response(true).unwrap();
    assert_eq!(channel.take()[0], ClientCommand::Reset { size: 2 });

    tree.expand(&"P1").unwrap();
    let commands = channel.take();
    assert_eq!(
        commands[0],
        ClientCommand::InsertRows {
            first_index: 1,
            count: 2
        }
    );
    assert_eq!(tree.index_of(&"P2").unwrap(), Some(3));

    tree.collapse(&"P1").unwrap();
    assert_eq!(
        channel.take(),
        vec![ClientCommand::RemoveRows {
            first_index: 1,
            count: 2
        }]
    );
    assert_eq!(tree.tree_size().unwrap(), 2);
}
