//! Integration tests mapping realistic object graphs through the public API.

use ionomer_core::codec::{ElementReader, ElementWriter, parse_text};
use ionomer_core::{
    AnnotationRule, Bytes, Codec, CodecError, CustomContext, CustomSerializer, Decimal,
    DefaultCodec, Element, Format, IonMapper, IonReader, IonSerializer, IonType, IonWriter, Ionic,
    IonicValue, MapError, NamingConvention, SerializationOptions, SerializerRef,
    SerializerRegistry, Symbol, Timestamp, TypeCatalog, TypeDescriptor, TypeHandle, Value, ionic,
    polymorphic, typed,
};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn element(text: &str) -> Element {
    parse_text(text).unwrap().remove(0)
}

fn field_names(element: &Element) -> Vec<&str> {
    element.as_struct().unwrap().iter().map(|(name, _)| name.as_str()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Engine {
    cylinders: i32,
    manufacture_date: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Car {
    make: String,
    model: String,
    year_of_manufacture: i32,
    #[ion(rename = "weightInKg")]
    weight: f64,
    engine: Engine,
}

const CAR: &str = r#"{make: "Honda", model: "Civic", yearOfManufacture: 2010, weightInKg: 0.73,
    engine: {cylinders: 4, manufactureDate: 2009-10-10T13:15:21Z}}"#;

#[test]
fn car_record_decodes_and_reencodes() {
    let mapper = IonMapper::default();
    let car: Car = mapper.deserialize(CAR.as_bytes()).unwrap();
    assert_eq!(car.make, "Honda");
    assert_eq!(car.model, "Civic");
    assert_eq!(car.year_of_manufacture, 2010);
    assert_eq!(car.weight, 0.73);
    assert_eq!(car.engine.cylinders, 4);
    assert_eq!(car.engine.manufacture_date.to_rfc3339(), "2009-10-10T13:15:21+00:00");

    let encoded = mapper.to_element(&car).unwrap();
    assert_eq!(
        field_names(&encoded),
        ["make", "model", "yearOfManufacture", "weightInKg", "engine"]
    );
    assert_eq!(field_names(encoded.get("engine").unwrap()), ["cylinders", "manufactureDate"]);

    let bytes = mapper.serialize(&car).unwrap();
    assert_eq!(mapper.deserialize::<Car>(&bytes).unwrap(), car);
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Inventory {
    counts: Vec<i32>,
    prices: BTreeMap<String, f64>,
    aliases: HashMap<String, Vec<String>>,
    note: Option<String>,
    label: Option<String>,
    checksum: [u8; 4],
    payload: Bytes,
    price: Decimal,
    state: Symbol,
    grade: char,
    big: u64,
    ratio: f32,
    serial: Uuid,
    spare: Box<Engine>,
    shared: Arc<String>,
    flags: Vec<Option<bool>>,
}

fn inventory() -> Inventory {
    Inventory {
        counts: vec![3, -1, 0],
        prices: BTreeMap::from([("bolt".to_string(), 0.25), ("nut".to_string(), 0.1)]),
        aliases: HashMap::from([("bolt".to_string(), vec!["screw".to_string()])]),
        note: None,
        label: Some("aisle 4".to_string()),
        checksum: [0xde, 0xad, 0xbe, 0xef],
        payload: Bytes(vec![0, 1, 2, 255]),
        price: Decimal::new(1999, -2),
        state: Symbol::new("stocked"),
        grade: 'A',
        big: u64::MAX,
        ratio: 0.5,
        serial: Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0),
        spare: Box::new(Engine {
            cylinders: 6,
            manufacture_date: Timestamp::default(),
        }),
        shared: Arc::new("warehouse".to_string()),
        flags: vec![Some(true), None, Some(false)],
    }
}

#[test]
fn containers_and_scalars_round_trip_in_every_format() {
    for format in [Format::Text, Format::PrettyText, Format::Binary] {
        let mapper = IonMapper::new(SerializationOptions::builder().format(format).build());
        let bytes = mapper.serialize(&inventory()).unwrap();
        let decoded: Inventory = mapper.deserialize(&bytes).unwrap();
        assert_eq!(decoded, inventory(), "format {format:?}");
    }
}

#[test]
fn absent_options_are_typed_nulls() {
    let mapper = IonMapper::default();
    let encoded = mapper.to_element(&inventory()).unwrap();
    assert_eq!(encoded.get("note"), Some(&Element::typed_null(IonType::String)));
    assert_eq!(encoded.get("state").and_then(Element::as_text), Some("stocked"));
}

#[test]
fn unsigned_extremes_stay_integers() {
    let mapper = IonMapper::default();
    let encoded = mapper.to_element(&u64::MAX).unwrap();
    assert_eq!(encoded.ion_type(), IonType::Int);
    assert_eq!(encoded.value(), &Value::Int(u64::MAX.into()));
    assert_eq!(mapper.serialize(&u64::MAX).unwrap(), b"18446744073709551615");

    let decoded: u64 = mapper.deserialize(b"18446744073709551615").unwrap();
    assert_eq!(decoded, u64::MAX);
    let err = mapper.deserialize::<i64>(b"18446744073709551615").unwrap_err();
    assert!(err.is_type_conversion());
}

#[test]
fn stream_of_values() {
    let mapper = IonMapper::default();
    let engines = vec![
        Engine {
            cylinders: 2,
            ..Engine::default()
        },
        Engine {
            cylinders: 8,
            ..Engine::default()
        },
    ];
    let bytes = mapper.serialize_all(&engines).unwrap();
    assert_eq!(mapper.deserialize_all::<Engine>(&bytes).unwrap(), engines);
    assert!(matches!(
        mapper.deserialize::<Engine>(b""),
        Err(MapError::Codec(CodecError::UnexpectedEof))
    ));
    assert!(matches!(
        mapper.deserialize::<Engine>(&bytes),
        Err(MapError::Codec(CodecError::TrailingValues { extra: 1 }))
    ));
}

/// Frames every stream with a version line.
struct VersionedCodec;

impl Codec for VersionedCodec {
    fn encode(&self, values: &[Element], format: Format) -> Result<Vec<u8>, CodecError> {
        let mut out = b"v1\n".to_vec();
        out.extend(DefaultCodec::default().encode(values, format)?);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Element>, CodecError> {
        let body = bytes
            .strip_prefix(&b"v1\n"[..])
            .ok_or_else(|| CodecError::InvalidState("missing version line".to_string()))?;
        DefaultCodec::default().decode(body)
    }
}

#[test]
fn custom_codec_owns_the_byte_layer() {
    let mapper = IonMapper::new(SerializationOptions::builder().codec(VersionedCodec).build());
    let engine = Engine {
        cylinders: 4,
        ..Engine::default()
    };
    let bytes = mapper.serialize(&engine).unwrap();
    assert!(bytes.starts_with(b"v1\n{cylinders:4,"));
    assert_eq!(mapper.deserialize::<Engine>(&bytes).unwrap(), engine);

    let err = mapper.deserialize::<Engine>(&bytes[3..]).unwrap_err();
    assert!(matches!(err, MapError::Codec(CodecError::InvalidState(_))));
    assert!(IonMapper::default().deserialize::<Engine>(&bytes).is_err());
}

#[test]
fn caller_owned_writer_and_reader() {
    let mapper = IonMapper::default();
    let car: Car = mapper.deserialize(CAR.as_bytes()).unwrap();

    let mut writer = ElementWriter::new();
    mapper.serialize_to(&car, &mut writer).unwrap();
    mapper.serialize_to(&car.engine, &mut writer).unwrap();
    let written = writer.finish().unwrap();
    assert_eq!(written.len(), 2);

    let mut reader = ElementReader::new(&written);
    reader.next().unwrap();
    assert_eq!(mapper.deserialize_from::<Car>(&mut reader).unwrap(), car);
    reader.next().unwrap();
    assert_eq!(mapper.deserialize_from::<Engine>(&mut reader).unwrap(), car.engine);
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Telemetry {
    max_rpm: i32,
    #[ion(rename = "ID")]
    device_id: String,
}

#[test]
fn naming_conventions_and_explicit_names() {
    let value = Telemetry {
        max_rpm: 7000,
        device_id: "x1".to_string(),
    };
    let expected = [
        (NamingConvention::CamelCase, ["maxRpm", "ID"]),
        (NamingConvention::TitleCase, ["MaxRpm", "ID"]),
        (NamingConvention::SnakeCase, ["max_rpm", "ID"]),
        (NamingConvention::Identity, ["max_rpm", "ID"]),
    ];
    for (naming, names) in expected {
        let mapper = IonMapper::new(SerializationOptions::builder().naming(naming).build());
        let encoded = mapper.to_element(&value).unwrap();
        assert_eq!(field_names(&encoded), names, "{naming:?}");
        assert_eq!(mapper.from_element::<Telemetry>(&encoded).unwrap(), value);
    }
}

#[test]
fn each_mapper_resolves_schemas_under_its_own_options() {
    let encoded_names = |mapper: &IonMapper| -> Vec<String> {
        let schema = mapper.schema::<Telemetry>().unwrap();
        schema.bindings().iter().map(|b| b.encoded_name().to_string()).collect()
    };
    let camel = IonMapper::default();
    let options = SerializationOptions::builder().naming(NamingConvention::SnakeCase).build();
    let snake = IonMapper::new(options);
    assert_eq!(encoded_names(&camel), ["maxRpm", "ID"]);
    assert_eq!(encoded_names(&snake), ["max_rpm", "ID"]);
    assert_eq!(encoded_names(&camel.clone()), ["maxRpm", "ID"]);
}

#[test]
fn unknown_and_differently_cased_fields() {
    let incoming = element(r#"{MAKE: "Honda", model: "Civic", sunroof: true}"#);

    let strict = IonMapper::default();
    let car: Car = strict.from_element(&incoming).unwrap();
    assert_eq!(car.make, "");
    assert_eq!(car.model, "Civic");

    let options = SerializationOptions::builder().property_name_case_insensitive(true).build();
    let relaxed = IonMapper::new(options);
    let car: Car = relaxed.from_element(&incoming).unwrap();
    assert_eq!(car.make, "Honda");
}

static CALLS: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn record(label: &'static str) {
    CALLS.lock().unwrap().push(label);
}

macro_rules! recording_serializer {
    ($name:ident, $label:literal) => {
        #[derive(Default)]
        struct $name;

        impl IonSerializer for $name {
            type Value = Label;

            fn serialize(
                &self,
                writer: &mut dyn IonWriter,
                _value: &Label,
            ) -> Result<(), MapError> {
                record($label);
                writer.write_symbol($label)?;
                Ok(())
            }

            fn deserialize(&self, reader: &mut dyn IonReader) -> Result<Label, MapError> {
                record($label);
                Ok(Label {
                    text: format!("{}:{}", $label, reader.read_symbol()?),
                })
            }
        }
    };
}

recording_serializer!(MemberSide, "member");
recording_serializer!(TypeSide, "type");
recording_serializer!(RegistrySide, "registry");
recording_serializer!(AnnotationSide, "annotation");

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
#[ion(serializer = "TypeSide")]
struct Label {
    text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Labelled {
    #[ion(serializer = "MemberSide")]
    first: Label,
    second: Label,
}

#[test]
fn serializer_precedence_is_member_type_registry_annotation() {
    let registry = SerializerRegistry::new()
        .with_type::<Label>(SerializerRef::typed(RegistrySide))
        .with_annotation("legacy", SerializerRef::typed(AnnotationSide));
    let mapper = IonMapper::new(SerializationOptions::builder().serializers(registry).build());

    CALLS.lock().unwrap().clear();
    let encoded = mapper.to_element(&Labelled::default()).unwrap();
    assert_eq!(encoded, element("{first: member, second: type}"));
    assert_eq!(*CALLS.lock().unwrap(), ["member", "type"]);

    CALLS.lock().unwrap().clear();
    let decoded: Labelled = mapper.from_element(&encoded).unwrap();
    assert_eq!(decoded.first.text, "member:member");
    assert_eq!(decoded.second.text, "type:type");
    assert_eq!(*CALLS.lock().unwrap(), ["member", "type"]);

    // Strings have no declared serializer, so the annotation-keyed entry
    // is the first match on the ladder.
    let registry = SerializerRegistry::new().with_annotation("legacy", SerializerRef::typed(Upper));
    let mapper = IonMapper::new(SerializationOptions::builder().serializers(registry).build());
    let text: String = mapper.from_element(&element("legacy::old")).unwrap();
    assert_eq!(text, "OLD");
}

struct Upper;

impl IonSerializer for Upper {
    type Value = String;

    fn serialize(&self, writer: &mut dyn IonWriter, value: &String) -> Result<(), MapError> {
        writer.write_string(&value.to_uppercase())?;
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<String, MapError> {
        Ok(reader.read_symbol()?.to_uppercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Sku {
    code: String,
}

struct Prefixed(String);

impl CustomSerializer for Prefixed {
    fn serialize(&self, writer: &mut dyn IonWriter, value: &dyn Any) -> Result<(), MapError> {
        let sku = value
            .downcast_ref::<Sku>()
            .ok_or_else(|| MapError::custom("expected a Sku"))?;
        writer.write_string(&format!("{}{}", self.0, sku.code))?;
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<Box<dyn Any>, MapError> {
        let text = reader.read_string()?;
        let code = text.strip_prefix(&self.0).unwrap_or(&text).to_string();
        Ok(Box::new(Sku { code }))
    }
}

#[test]
fn serializer_factories_run_once_per_call_with_context() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let factory = SerializerRef::factory(
        move |_: &SerializationOptions, context: &CustomContext| -> Arc<dyn CustomSerializer> {
            counter.fetch_add(1, Ordering::SeqCst);
            let prefix = context.get::<String>("prefix").cloned().unwrap_or_default();
            Arc::new(Prefixed(prefix))
        },
    );
    let options = SerializationOptions::builder()
        .serializers(SerializerRegistry::new().with_type::<Sku>(factory))
        .context(CustomContext::new().with("prefix", "ACME-".to_string()))
        .build();
    let mapper = IonMapper::new(options);

    let skus = vec![
        Sku { code: "1".to_string() },
        Sku { code: "2".to_string() },
        Sku { code: "3".to_string() },
    ];
    let encoded = mapper.to_element(&skus).unwrap();
    assert_eq!(encoded, element(r#"["ACME-1", "ACME-2", "ACME-3"]"#));
    assert_eq!(created.load(Ordering::SeqCst), 1);

    let decoded: Vec<Sku> = mapper.from_element(&encoded).unwrap();
    assert_eq!(decoded, skus);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

fn sku_prefixer(_: &SerializationOptions, context: &CustomContext) -> Arc<dyn CustomSerializer> {
    let prefix = context.get::<String>("prefix").cloned().unwrap_or_default();
    Arc::new(Prefixed(prefix))
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Shipment {
    #[ion(serializer_factory = "sku_prefixer")]
    sku: Sku,
    quantity: i32,
}

#[test]
fn derived_member_factory_sees_the_call_context() {
    let shipment = Shipment {
        sku: Sku {
            code: "77".to_string(),
        },
        quantity: 3,
    };
    let options = SerializationOptions::builder()
        .context(CustomContext::new().with("prefix", "EU-".to_string()))
        .build();
    let mapper = IonMapper::new(options);
    let encoded = mapper.to_element(&shipment).unwrap();
    assert_eq!(encoded, element(r#"{sku: "EU-77", quantity: 3}"#));
    assert_eq!(mapper.from_element::<Shipment>(&encoded).unwrap(), shipment);

    let plain = IonMapper::default().to_element(&shipment).unwrap();
    assert_eq!(plain, element(r#"{sku: "77", quantity: 3}"#));
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Node {
    value: i32,
    next: Option<Box<Node>>,
}

fn chain(len: i32) -> Node {
    (1..len).rev().fold(Node { value: len, next: None }, |next, value| Node {
        value,
        next: Some(Box::new(next)),
    })
}

#[test]
fn depth_limit_is_inclusive() {
    let limited = IonMapper::new(SerializationOptions::builder().max_depth(5).build());
    let roomy = IonMapper::default();

    let within = chain(5);
    let encoded = limited.to_element(&within).unwrap();
    assert_eq!(limited.from_element::<Node>(&encoded).unwrap(), within);

    let beyond = chain(6);
    let err = limited.to_element(&beyond).unwrap_err();
    assert!(err.is_depth_exceeded());
    assert!(matches!(err, MapError::DepthExceeded { max_depth: 5 }));

    let encoded = roomy.to_element(&beyond).unwrap();
    assert!(limited.from_element::<Node>(&encoded).unwrap_err().is_depth_exceeded());
    assert_eq!(roomy.from_element::<Node>(&encoded).unwrap(), beyond);
}

#[test]
fn binary_frames_hold_graphs_at_the_depth_limit() {
    let mapper = IonMapper::new(SerializationOptions::builder().format(Format::Binary).build());
    let deepest = chain(ionomer_core::DEFAULT_MAX_DEPTH as i32);
    let bytes = mapper.serialize(&deepest).unwrap();
    assert_eq!(mapper.deserialize::<Node>(&bytes).unwrap(), deepest);
    assert!(mapper.serialize(&chain(65)).unwrap_err().is_depth_exceeded());

    // Deeper limits need a larger stack than the default test thread.
    std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(|| {
            for format in [Format::Binary, Format::Text] {
                let options = SerializationOptions::builder().max_depth(200).format(format).build();
                let mapper = IonMapper::new(options);
                let deepest = chain(200);
                let bytes = mapper.serialize(&deepest).unwrap();
                assert_eq!(mapper.deserialize::<Node>(&bytes).unwrap(), deepest, "{format:?}");
            }
        })
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn hostile_nesting_fails_as_too_deep() {
    let text = "[".repeat(20_000) + &"]".repeat(20_000);
    let err = IonMapper::default().deserialize::<Vec<i32>>(text.as_bytes()).unwrap_err();
    assert!(matches!(err, MapError::DepthExceeded { max_depth: 64 }));

    let options = SerializationOptions::builder().max_depth(3).build();
    let shallow = IonMapper::new(options);
    let nested = "[".repeat(80) + &"]".repeat(80);
    let err = shallow.deserialize::<Vec<Vec<i32>>>(nested.as_bytes()).unwrap_err();
    assert!(matches!(err, MapError::DepthExceeded { max_depth: 3 }));
    let decoded: Vec<Vec<i32>> = shallow.deserialize(b"[[1], [2, 3]]").unwrap();
    assert_eq!(decoded, [vec![1], vec![2, 3]]);
}

#[test]
fn depth_limit_ignores_permissive_mode() {
    let options = SerializationOptions::builder().max_depth(2).permissive_mode(true).build();
    let mapper = IonMapper::new(options);
    let encoded = IonMapper::default().to_element(&chain(4)).unwrap();
    assert!(mapper.from_element::<Node>(&encoded).unwrap_err().is_depth_exceeded());
}

trait Vehicle: IonicValue + std::fmt::Debug {
    fn wheels(&self) -> u32;
}

impl Ionic for dyn Vehicle {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::abstract_type("Vehicle", module_path!())
            .annotate(AnnotationRule::for_type())
            .fallback::<Sedan>()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
#[ion(extends = "dyn Vehicle")]
struct Sedan {
    seats: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
#[ion(extends = "dyn Vehicle")]
struct Truck {
    payload_kg: f64,
}

impl Vehicle for Sedan {
    fn wheels(&self) -> u32 {
        4
    }
}

impl Vehicle for Truck {
    fn wheels(&self) -> u32 {
        6
    }
}

polymorphic!(dyn Vehicle => [Sedan, Truck]);

#[derive(Debug, Default, Ionic)]
struct Garage {
    vehicles: Vec<Box<dyn Vehicle>>,
}

#[test]
fn subtypes_inherit_the_base_annotation() {
    let mapper = IonMapper::default();
    let sedan_annotation = mapper.annotation_of::<Sedan>().unwrap();
    assert_eq!(sedan_annotation, format!("{}::Sedan", module_path!()));

    let garage = Garage {
        vehicles: vec![Box::new(Sedan { seats: 5 }), Box::new(Truck { payload_kg: 900.0 })],
    };
    let encoded = mapper.to_element(&garage).unwrap();
    let items = encoded.get("vehicles").and_then(Element::as_sequence).unwrap();
    assert_eq!(items[0].annotations(), [sedan_annotation]);
    assert_eq!(items[1].annotations(), [mapper.annotation_of::<Truck>().unwrap()]);
    assert!(encoded.annotations().is_empty());

    let decoded: Garage = mapper.deserialize(&mapper.serialize(&garage).unwrap()).unwrap();
    assert_eq!(decoded.vehicles.len(), 2);
    assert_eq!(decoded.vehicles[1].wheels(), 6);
    let truck = (*decoded.vehicles[1]).as_any().downcast_ref::<Truck>().unwrap();
    assert_eq!(truck.payload_kg, 900.0);
}

#[test]
fn unknown_or_missing_annotations_fall_back() {
    let mapper = IonMapper::default();
    let incoming = element("'nowhere::Boat'::{seats: 7}");
    let decoded: Box<dyn Vehicle> = mapper.from_element(&incoming).unwrap();
    assert_eq!((*decoded).as_any().downcast_ref::<Sedan>(), Some(&Sedan { seats: 7 }));

    let decoded: Box<dyn Vehicle> = mapper.from_element(&element("{seats: 2}")).unwrap();
    assert_eq!(decoded.wheels(), 4);
}

#[test]
fn catalogs_resolve_annotations_to_types() {
    let options = SerializationOptions::builder()
        .search_module(TypeCatalog::new("fleet").with::<Sedan>().with::<Truck>())
        .build();
    let mapper = IonMapper::new(options);
    let annotation = mapper.annotation_of::<Truck>().unwrap();
    assert_eq!(mapper.resolve_annotation(&annotation).unwrap(), TypeHandle::of::<Truck>());

    let err = mapper.resolve_annotation("fleet::Boat").unwrap_err();
    assert!(matches!(err, MapError::AnnotationResolution { .. }));
}

#[test]
fn dynamic_values_map_through_their_runtime_type() {
    let mapper = IonMapper::default();
    let encoded = mapper.to_element_dynamic(&Truck { payload_kg: 10.0 }).unwrap();
    assert_eq!(encoded.annotations(), [mapper.annotation_of::<Truck>().unwrap()]);

    let decoded = mapper.deserialize_dynamic(&encoded, TypeHandle::of::<Truck>()).unwrap();
    assert_eq!(decoded.downcast_ref::<Truck>(), Some(&Truck { payload_kg: 10.0 }));
}

trait Shape: IonicValue + std::fmt::Debug {}

impl Ionic for dyn Shape {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::abstract_type("Shape", "geometry")
            .annotate(AnnotationRule::for_type().exclude_descendants())
            .fallback::<Circle>()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
#[ion(extends = "dyn Shape")]
struct Circle {
    radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
#[ion(extends = "dyn Shape", annotate(annotation = "shape.square"))]
struct Square {
    side: f64,
}

impl Shape for Circle {}
impl Shape for Square {}

polymorphic!(dyn Shape => [Circle, Square]);

#[derive(Ionic)]
#[ion(constructor(params(pinned, loose)))]
struct Drawing {
    #[ion(annotate(annotation = "pinned"))]
    pinned: Box<dyn Shape>,
    loose: Box<dyn Shape>,
}

impl Drawing {
    fn new(pinned: Box<dyn Shape>, loose: Box<dyn Shape>) -> Self {
        Drawing { pinned, loose }
    }
}

#[test]
fn excluded_descendants_keep_their_own_rule() {
    let mapper = IonMapper::default();
    let circle: Box<dyn Shape> = Box::new(Circle { radius: 1.0 });
    let square: Box<dyn Shape> = Box::new(Square { side: 2.0 });
    assert!(mapper.to_element(&circle).unwrap().annotations().is_empty());
    assert_eq!(mapper.to_element(&square).unwrap().annotations(), ["shape.square"]);

    let options = SerializationOptions::builder().include_type_information(true).build();
    let everything = IonMapper::new(options);
    assert_eq!(
        everything.to_element(&circle).unwrap().annotations(),
        [format!("{}::Circle", module_path!())]
    );

    let incoming = element("'shape.square'::{side: 3.0}");
    let decoded: Box<dyn Shape> = mapper.from_element(&incoming).unwrap();
    assert_eq!((*decoded).as_any().downcast_ref::<Square>(), Some(&Square { side: 3.0 }));
}

#[test]
fn member_annotation_wins_over_type_rules() {
    let mapper = IonMapper::default();
    let drawing = Drawing::new(Box::new(Square { side: 2.5 }), Box::new(Circle { radius: 1.0 }));
    let encoded = mapper.to_element(&drawing).unwrap();
    assert_eq!(encoded.get("pinned").unwrap().annotations(), ["pinned", "shape.square"]);
    assert!(encoded.get("loose").unwrap().annotations().is_empty());

    let decoded: Drawing = mapper.from_element(&encoded).unwrap();
    assert_eq!((*decoded.pinned).as_any().downcast_ref::<Square>(), Some(&Square { side: 2.5 }));
    assert_eq!((*decoded.loose).as_any().downcast_ref::<Circle>(), Some(&Circle { radius: 1.0 }));

    let drawing = Drawing::new(Box::new(Circle { radius: 2.0 }), Box::new(Square { side: 2.0 }));
    let encoded = mapper.to_element(&drawing).unwrap();
    assert_eq!(
        encoded.get("pinned").unwrap().annotations(),
        ["pinned".to_string(), format!("{}::Circle", module_path!())]
    );
    assert_eq!(encoded.get("loose").unwrap().annotations(), ["shape.square"]);

    let decoded: Drawing = mapper.from_element(&encoded).unwrap();
    assert_eq!((*decoded.pinned).as_any().downcast_ref::<Circle>(), Some(&Circle { radius: 2.0 }));
    assert_eq!((*decoded.loose).as_any().downcast_ref::<Square>(), Some(&Square { side: 2.0 }));
}

#[test]
fn annotation_shared_by_implementors_falls_back() {
    let mapper = IonMapper::default();
    let incoming = element("{pinned: pinned::{radius: 3.0}, loose: 'shape.square'::{side: 1.0}}");
    let decoded: Drawing = mapper.from_element(&incoming).unwrap();
    assert_eq!((*decoded.pinned).as_any().downcast_ref::<Circle>(), Some(&Circle { radius: 3.0 }));
    assert!((*decoded.loose).as_any().is::<Square>());
}

struct BlankShape;

impl IonSerializer for BlankShape {
    type Value = Box<dyn Shape>;

    fn serialize(
        &self,
        writer: &mut dyn IonWriter,
        _value: &Box<dyn Shape>,
    ) -> Result<(), MapError> {
        writer.write_null(IonType::Struct)?;
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<Box<dyn Shape>, MapError> {
        if !reader.is_null() {
            return Err(MapError::custom("only nulls are blank"));
        }
        Ok(Box::new(Circle { radius: 0.5 }))
    }
}

#[test]
fn null_polymorphic_values_reach_custom_serializers() {
    let err = IonMapper::default().from_element::<Box<dyn Shape>>(&element("null")).unwrap_err();
    assert!(err.is_type_conversion());

    let registry =
        SerializerRegistry::new().with_type::<Box<dyn Shape>>(SerializerRef::typed(BlankShape));
    let mapper = IonMapper::new(SerializationOptions::builder().serializers(registry).build());
    let blank: Box<dyn Shape> = mapper.from_element(&element("null.struct")).unwrap();
    assert_eq!((*blank).as_any().downcast_ref::<Circle>(), Some(&Circle { radius: 0.5 }));

    let incoming = element("'shape.square'::{side: 4.0}");
    let square: Box<dyn Shape> = mapper.from_element(&incoming).unwrap();
    assert_eq!((*square).as_any().downcast_ref::<Square>(), Some(&Square { side: 4.0 }));
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Reading {
    sensor: String,
    value: i32,
    unit: String,
    history: Vec<i32>,
}

#[test]
fn permissive_mode_skips_only_the_bad_field() {
    let incoming = element(r#"{sensor: "t1", value: "high", unit: "C", history: [1, "two", 3]}"#);

    let err = IonMapper::default().from_element::<Reading>(&incoming).unwrap_err();
    assert!(err.is_type_conversion());

    let mapper = IonMapper::new(SerializationOptions::builder().permissive_mode(true).build());
    let reading: Reading = mapper.from_element(&incoming).unwrap();
    assert_eq!(
        reading,
        Reading {
            sensor: "t1".to_string(),
            value: 0,
            unit: "C".to_string(),
            history: vec![1, 3],
        }
    );

    let reading: Reading = mapper.from_element(&element(r#"{value: "42", unit: null}"#)).unwrap();
    assert_eq!(reading.value, 42);
    assert_eq!(reading.unit, "");
}

#[test]
fn null_for_a_required_value_is_a_conversion_error() {
    let err = IonMapper::default()
        .from_element::<Reading>(&element("{unit: null.string}"))
        .unwrap_err();
    assert!(err.is_type_conversion());
    assert!(err.to_string().starts_with("cannot convert null"));
}

#[derive(Debug, Clone, PartialEq, Ionic)]
#[ion(constructor(params(id, display_name, nickname)))]
struct Account {
    id: u64,
    display_name: String,
    nickname: Option<String>,
    balance: i64,
}

impl Account {
    fn new(id: u64, display_name: String, nickname: Option<String>) -> Self {
        Account {
            id,
            display_name,
            nickname,
            balance: 0,
        }
    }
}

#[test]
fn designated_constructor_binds_by_encoded_name() {
    let mapper = IonMapper::default();
    let schema = mapper.schema::<Account>().unwrap();
    assert_eq!(schema.construction().parameters(), ["id", "displayName", "nickname"]);

    let account: Account = mapper
        .from_element(&element(r#"{balance: 12, displayName: "Ann", id: 7, id: 8}"#))
        .unwrap();
    assert_eq!(
        account,
        Account {
            id: 8,
            display_name: "Ann".to_string(),
            nickname: None,
            balance: 12,
        }
    );

    let options = SerializationOptions::builder().naming(NamingConvention::SnakeCase).build();
    let snake = IonMapper::new(options);
    let account: Account = snake.from_element(&element(r#"{id: 1, display_name: "Bo"}"#)).unwrap();
    assert_eq!(account.display_name, "Bo");
}

#[test]
fn missing_constructor_argument() {
    let incoming = element("{id: 7}");
    let err = IonMapper::default().from_element::<Account>(&incoming).unwrap_err();
    assert!(err.is_construction());
    assert!(err.to_string().contains("missing required argument \"displayName\""));

    let mapper = IonMapper::new(SerializationOptions::builder().permissive_mode(true).build());
    let account: Account = mapper.from_element(&incoming).unwrap();
    assert_eq!(account.display_name, "");
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Clashing {
    #[ion(rename = "code")]
    primary: i32,
    code: i32,
}

#[test]
fn colliding_encoded_names_fail_resolution() {
    let err = IonMapper::default().serialize(&Clashing::default()).unwrap_err();
    assert!(err.is_schema_resolution());
    assert!(!err.is_recoverable());
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Tally {
    #[ion(skip)]
    seed: i64,
    count: i32,
}

#[test]
fn object_factory_intercepts_default_construction() {
    let options = SerializationOptions::builder()
        .context(CustomContext::new().with("seed", 40i64))
        .object_factory(|ty: TypeHandle, context: &CustomContext| -> Option<Box<dyn Any>> {
            if !ty.is::<Tally>() {
                return None;
            }
            let seed = *context.get::<i64>("seed")?;
            Some(Box::new(Tally { seed, count: 0 }) as Box<dyn Any>)
        })
        .build();
    let mapper = IonMapper::new(options);
    let tally: Tally = mapper.from_element(&element("{count: 2}")).unwrap();
    assert_eq!(tally, Tally { seed: 40, count: 2 });

    let encoded = mapper.to_element(&tally).unwrap();
    assert_eq!(encoded, element("{count: 2}"));
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Profile {
    name: String,
    nickname: Option<String>,
    age: i32,
    tags: Vec<String>,
}

#[test]
fn nulls_and_defaults_can_be_omitted() {
    let profile = Profile {
        name: "Ada".to_string(),
        ..Profile::default()
    };

    let encoded = IonMapper::default().to_element(&profile).unwrap();
    assert_eq!(field_names(&encoded), ["name", "nickname", "age", "tags"]);

    let mapper = IonMapper::new(SerializationOptions::builder().ignore_nulls(true).build());
    assert_eq!(field_names(&mapper.to_element(&profile).unwrap()), ["name", "age", "tags"]);

    let mapper = IonMapper::new(SerializationOptions::builder().ignore_defaults(true).build());
    let encoded = mapper.to_element(&profile).unwrap();
    assert_eq!(encoded, element(r#"{name: "Ada"}"#));
    assert_eq!(mapper.from_element::<Profile>(&encoded).unwrap(), profile);
}

static READING_WRITES: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct CountedReading;

impl IonSerializer for CountedReading {
    type Value = i32;

    fn serialize(&self, writer: &mut dyn IonWriter, value: &i32) -> Result<(), MapError> {
        READING_WRITES.fetch_add(1, Ordering::SeqCst);
        writer.write_int(i128::from(*value))?;
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn IonReader) -> Result<i32, MapError> {
        let value = reader.read_int()?;
        i32::try_from(value).map_err(|_| MapError::conversion("i32", value.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Meter {
    #[ion(serializer = "CountedReading")]
    reading: i32,
    unit: String,
    spare: Engine,
}

#[test]
fn default_check_compares_values_not_encodings() {
    let mapper = IonMapper::new(SerializationOptions::builder().ignore_defaults(true).build());
    READING_WRITES.store(0, Ordering::SeqCst);

    let meter = Meter {
        reading: 5,
        ..Meter::default()
    };
    assert_eq!(mapper.to_element(&meter).unwrap(), element("{reading: 5}"));
    assert_eq!(READING_WRITES.load(Ordering::SeqCst), 1);

    assert_eq!(mapper.to_element(&Meter::default()).unwrap(), element("{}"));
    assert_eq!(READING_WRITES.load(Ordering::SeqCst), 1);

    let meter = Meter {
        spare: Engine {
            cylinders: 2,
            ..Engine::default()
        },
        ..Meter::default()
    };
    assert_eq!(mapper.to_element(&meter).unwrap(), element("{spare: {cylinders: 2}}"));
    assert_eq!(READING_WRITES.load(Ordering::SeqCst), 1);
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Order {
    id: Uuid,
}

#[test]
fn guids_are_annotated_on_request() {
    let order = Order {
        id: Uuid::from_u128(42),
    };
    let plain = IonMapper::default().to_element(&order).unwrap();
    assert!(plain.get("id").unwrap().annotations().is_empty());

    let mapper = IonMapper::new(SerializationOptions::builder().annotate_guids(true).build());
    let annotated = mapper.to_element(&order).unwrap();
    assert!(annotated.get("id").unwrap().has_annotation(ionomer_core::GUID_ANNOTATION));
    assert_eq!(mapper.from_element::<Order>(&annotated).unwrap(), order);
    assert_eq!(IonMapper::default().from_element::<Order>(&annotated).unwrap(), order);
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Legacy {
    name: String,
    #[ion(field)]
    legacy_code: String,
    #[ion(field, include)]
    revision: i32,
    #[ion(read_only)]
    checksum: u32,
}

#[test]
fn fields_are_opt_in_and_keep_declared_names() {
    let value = Legacy {
        name: "a".to_string(),
        legacy_code: "X9".to_string(),
        revision: 3,
        checksum: 77,
    };
    let encoded = IonMapper::default().to_element(&value).unwrap();
    assert_eq!(field_names(&encoded), ["name", "revision", "checksum"]);

    let mapper = IonMapper::new(SerializationOptions::builder().include_fields(true).build());
    let encoded = mapper.to_element(&value).unwrap();
    assert_eq!(field_names(&encoded), ["name", "legacy_code", "revision", "checksum"]);
    let decoded: Legacy = mapper.from_element(&encoded).unwrap();
    assert_eq!(decoded.legacy_code, "X9");
    assert_eq!(decoded.checksum, 0);

    let options = SerializationOptions::builder().ignore_read_only_properties(true).build();
    let mapper = IonMapper::new(options);
    assert_eq!(field_names(&mapper.to_element(&value).unwrap()), ["name", "revision"]);
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
struct Ledger {
    owner: String,
    #[ion(field, include, read_only)]
    audit_id: i32,
    #[ion(read_only)]
    total: i32,
}

#[test]
fn read_only_fields_and_properties_drop_separately() {
    let ledger = Ledger {
        owner: "ops".to_string(),
        audit_id: 9,
        total: 40,
    };
    let encoded = IonMapper::default().to_element(&ledger).unwrap();
    assert_eq!(field_names(&encoded), ["owner", "audit_id", "total"]);

    let options = SerializationOptions::builder().ignore_read_only_fields(true).build();
    let mapper = IonMapper::new(options);
    assert_eq!(field_names(&mapper.to_element(&ledger).unwrap()), ["owner", "total"]);
    let decoded: Ledger = mapper.from_element(&encoded).unwrap();
    assert_eq!(decoded.owner, "ops");
    assert_eq!((decoded.audit_id, decoded.total), (0, 0));

    let options = SerializationOptions::builder()
        .ignore_read_only_fields(true)
        .ignore_read_only_properties(true)
        .build();
    let mapper = IonMapper::new(options);
    assert_eq!(field_names(&mapper.to_element(&ledger).unwrap()), ["owner"]);
}

#[derive(Debug, Clone, Default, PartialEq, Ionic)]
#[ion(method(get = "full_name", set = "set_full_name", ty = "String"))]
struct Person {
    first: String,
    last: String,
}

impl Person {
    fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }

    fn set_full_name(&mut self, full: String) {
        let (first, last) = full.split_once(' ').unwrap_or((full.as_str(), ""));
        self.first = first.to_string();
        self.last = last.to_string();
    }
}

#[test]
fn method_pairs_map_like_properties() {
    let mapper = IonMapper::default();
    let person = Person {
        first: "Grace".to_string(),
        last: "Hopper".to_string(),
    };
    let encoded = mapper.to_element(&person).unwrap();
    assert_eq!(encoded.get("fullName").and_then(Element::as_text), Some("Grace Hopper"));

    let decoded: Person = mapper.from_element(&element(r#"{fullName: "Ada Lovelace"}"#)).unwrap();
    assert_eq!(decoded.first, "Ada");
    assert_eq!(decoded.last, "Lovelace");
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Ionic)]
enum Fuel {
    #[default]
    Petrol,
    Diesel,
    #[ion(rename = "EV")]
    Electric,
}

#[ionic]
struct Pump {
    fuel: Fuel,
    litres: f64,
}

#[test]
fn unit_enums_are_symbols() {
    let mapper = IonMapper::default();
    let pump = Pump {
        fuel: Fuel::Electric,
        litres: 0.0,
    };
    let encoded = mapper.to_element(&pump).unwrap();
    assert_eq!(encoded.get("fuel"), Some(&Element::symbol("EV")));
    assert_eq!(mapper.from_element::<Pump>(&encoded).unwrap(), pump);

    let lowercase = element("{fuel: diesel}");
    assert!(mapper.from_element::<Pump>(&lowercase).unwrap_err().is_type_conversion());
    let permissive = IonMapper::new(SerializationOptions::builder().permissive_mode(true).build());
    assert_eq!(permissive.from_element::<Pump>(&lowercase).unwrap().fuel, Fuel::Diesel);
}

#[test]
fn one_mapper_serves_many_threads() {
    let mapper = IonMapper::default();
    let car: Car = mapper.deserialize(CAR.as_bytes()).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let mapper = mapper.clone();
            let car = car.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let bytes = mapper.serialize(&car).unwrap();
                    assert_eq!(mapper.deserialize::<Car>(&bytes).unwrap(), car);
                }
            });
        }
    });

    let first = mapper.schema::<Car>().unwrap();
    let second = mapper.clone().schema::<Car>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn registered_type_serializer_sees_custom_writer() {
    let registry =
        SerializerRegistry::new().with_type::<String>(SerializerRef::Instance(typed(Upper)));
    let mapper = IonMapper::new(SerializationOptions::builder().serializers(registry).build());
    let encoded = mapper
        .to_element(&Sku {
            code: "ab".to_string(),
        })
        .unwrap();
    assert_eq!(encoded, element(r#"{code: "AB"}"#));
}
