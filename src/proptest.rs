use std::collections::HashMap;

use crate::{Archive, Entry, Template};
use bytes::Bytes;
use proptest::{
    arbitrary::Arbitrary,
    strategy::{BoxedStrategy, MapInto, Strategy},
};

/// Names and in-memory content of archive entries.
/// Names never end with a slash, so all of the entries are files.
#[derive(Clone, Debug)]
pub struct TestEntryData(pub Vec<(String, Bytes)>);

/// A type that holds both an archive and the entries it contains.
#[derive(Clone, Debug)]
pub struct ArchiveAndData {
    pub archive: Archive,
    pub data: TestEntryData,
}

#[derive(Clone, Debug)]
pub struct ArbitraryTestEntryDataParams {
    /// How many entries to generate at most
    pub max_count: usize,

    /// How much data can an entry have
    pub max_size: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ArbitraryArchiveParams {
    /// Parameters for generating the entries
    pub entries: ArbitraryTestEntryDataParams,
    /// Controls whether the archive gets an in-memory prefix.
    pub prefix: bool,
}

impl Arbitrary for TestEntryData {
    type Parameters = ArbitraryTestEntryDataParams;
    type Strategy = BoxedStrategy<TestEntryData>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        proptest::collection::hash_map(
            "(.*[^/])?",
            proptest::collection::vec(proptest::bits::u8::ANY, 0..args.max_size)
                .prop_map_into::<Bytes>(),
            0..args.max_count,
        )
        .prop_map_into()
        .boxed()
    }
}

impl Arbitrary for ArchiveAndData {
    type Parameters = ArbitraryArchiveParams;
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        let prefix_strategy = if args.prefix {
            proptest::collection::vec(proptest::bits::u8::ANY, 0..64).boxed()
        } else {
            proptest::strategy::Just(Vec::new()).boxed()
        };

        (
            TestEntryData::arbitrary_with(args.entries),
            prefix_strategy,
        )
            .prop_map(|(data, prefix)| {
                let mut template: Template = data.clone().into();
                if !prefix.is_empty() {
                    template.prefix_bytes(prefix);
                }

                ArchiveAndData {
                    archive: template
                        .build()
                        .expect("Building archive from generated entries should never fail"),
                    data,
                }
            })
            .boxed()
    }
}

impl Arbitrary for Archive {
    type Parameters = ArbitraryArchiveParams;
    type Strategy = MapInto<BoxedStrategy<ArchiveAndData>, Self>;

    fn arbitrary_with(args: Self::Parameters) -> Self::Strategy {
        ArchiveAndData::arbitrary_with(args).prop_map_into()
    }
}

impl Default for ArbitraryTestEntryDataParams {
    fn default() -> Self {
        ArbitraryTestEntryDataParams {
            max_count: 64,
            max_size: 512,
        }
    }
}

impl From<ArchiveAndData> for Archive {
    fn from(value: ArchiveAndData) -> Self {
        value.archive
    }
}

impl From<HashMap<String, Bytes>> for TestEntryData {
    fn from(value: HashMap<String, Bytes>) -> Self {
        TestEntryData(value.into_iter().collect())
    }
}

impl From<TestEntryData> for Template {
    fn from(value: TestEntryData) -> Self {
        let mut template = Template::new();

        for (name, content) in value.0 {
            template.add_entry(Entry::stored(name, content));
        }

        template
    }
}
