//! Descriptors for the built-in scalar and container types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::any::{Any, type_name};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    IndirectShape, Ionic, Kind, MapShape, OptionalShape, SequenceShape, TypeDescriptor, TypeHandle,
    downcast,
};
use crate::element::{Decimal, Timestamp};
use crate::error::MapError;
use crate::primitive::{Bytes, Clob, Symbol};

macro_rules! impl_ionic_scalar {
    ($($t:ty => $name:expr),* $(,)?) => {
        $(
            impl Ionic for $t {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::scalar::<$t>($name)
                }
            }
        )*
    };
}

impl_ionic_scalar! {
    bool => "bool",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
    char => "char",
    String => "String",
    Symbol => "Symbol",
    Decimal => "Decimal",
    Timestamp => "Timestamp",
    DateTime<Utc> => "DateTime",
    Bytes => "Bytes",
    Clob => "Clob",
    Uuid => "Uuid",
}

fn sequence_items<C, T>(value: &dyn Any) -> Option<Vec<&dyn Any>>
where
    C: 'static,
    T: 'static,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
{
    value
        .downcast_ref::<C>()
        .map(|items| items.into_iter().map(|item| item as &dyn Any).collect())
}

fn collect_items<T: 'static>(items: Vec<Box<dyn Any>>) -> Result<Vec<T>, MapError> {
    items.into_iter().map(downcast::<T>).collect()
}

fn sequence_build<C, T>(items: Vec<Box<dyn Any>>) -> Result<Box<dyn Any>, MapError>
where
    C: FromIterator<T> + 'static,
    T: 'static,
{
    let items = collect_items::<T>(items)?;
    Ok(Box::new(items.into_iter().collect::<C>()))
}

fn sequence<C, T>(name: &str) -> TypeDescriptor
where
    C: FromIterator<T> + Default + 'static,
    T: Ionic,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
{
    TypeDescriptor::new(
        name,
        "",
        Kind::Sequence(SequenceShape {
            element: TypeHandle::of::<T>(),
            items: sequence_items::<C, T>,
            build: sequence_build::<C, T>,
        }),
    )
    .with_default(C::default)
}

impl<T: Ionic> Ionic for Vec<T> {
    fn describe() -> TypeDescriptor {
        sequence::<Vec<T>, T>("Vec")
    }
}

impl<T: Ionic> Ionic for VecDeque<T> {
    fn describe() -> TypeDescriptor {
        sequence::<VecDeque<T>, T>("VecDeque")
    }
}

impl<T: Ionic + Eq + Hash> Ionic for HashSet<T> {
    fn describe() -> TypeDescriptor {
        sequence::<HashSet<T>, T>("HashSet")
    }
}

impl<T: Ionic + Ord> Ionic for BTreeSet<T> {
    fn describe() -> TypeDescriptor {
        sequence::<BTreeSet<T>, T>("BTreeSet")
    }
}

fn array_build<T: 'static, const N: usize>(
    items: Vec<Box<dyn Any>>,
) -> Result<Box<dyn Any>, MapError> {
    let items = collect_items::<T>(items)?;
    let found = items.len();
    let array: [T; N] = items
        .try_into()
        .map_err(|_| {
            MapError::conversion(type_name::<[T; N]>(), format!("list of {found} items"))
        })?;
    Ok(Box::new(array))
}

impl<T: Ionic, const N: usize> Ionic for [T; N] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new(
            "Array",
            "",
            Kind::Sequence(SequenceShape {
                element: TypeHandle::of::<T>(),
                items: sequence_items::<[T; N], T>,
                build: array_build::<T, N>,
            }),
        )
    }
}

fn map_entries<C, V>(value: &dyn Any) -> Option<Vec<(&str, &dyn Any)>>
where
    C: 'static,
    V: 'static,
    for<'a> &'a C: IntoIterator<Item = (&'a String, &'a V)>,
{
    value.downcast_ref::<C>().map(|entries| {
        entries
            .into_iter()
            .map(|(key, value)| (key.as_str(), value as &dyn Any))
            .collect()
    })
}

fn map_build<C, V>(entries: Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, MapError>
where
    C: FromIterator<(String, V)> + 'static,
    V: 'static,
{
    let entries = entries
        .into_iter()
        .map(|(key, value)| downcast::<V>(value).map(|value| (key, value)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(entries.into_iter().collect::<C>()))
}

fn map<C, V>(name: &str) -> TypeDescriptor
where
    C: FromIterator<(String, V)> + Default + 'static,
    V: Ionic,
    for<'a> &'a C: IntoIterator<Item = (&'a String, &'a V)>,
{
    TypeDescriptor::new(
        name,
        "",
        Kind::Map(MapShape {
            value: TypeHandle::of::<V>(),
            entries: map_entries::<C, V>,
            build: map_build::<C, V>,
        }),
    )
    .with_default(C::default)
}

impl<V: Ionic> Ionic for HashMap<String, V> {
    fn describe() -> TypeDescriptor {
        map::<HashMap<String, V>, V>("HashMap")
    }
}

impl<V: Ionic> Ionic for BTreeMap<String, V> {
    fn describe() -> TypeDescriptor {
        map::<BTreeMap<String, V>, V>("BTreeMap")
    }
}

impl<V: Ionic> Ionic for IndexMap<String, V> {
    fn describe() -> TypeDescriptor {
        map::<IndexMap<String, V>, V>("IndexMap")
    }
}

fn option_get<T: 'static>(value: &dyn Any) -> Option<Option<&dyn Any>> {
    value
        .downcast_ref::<Option<T>>()
        .map(|option| option.as_ref().map(|inner| inner as &dyn Any))
}

fn option_some<T: 'static>(value: Box<dyn Any>) -> Result<Box<dyn Any>, MapError> {
    Ok(Box::new(Some(downcast::<T>(value)?)))
}

fn option_none<T: 'static>() -> Box<dyn Any> {
    Box::new(None::<T>)
}

impl<T: Ionic> Ionic for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new(
            "Option",
            "",
            Kind::Optional(OptionalShape {
                inner: TypeHandle::of::<T>(),
                get: option_get::<T>,
                some: option_some::<T>,
                none: option_none::<T>,
            }),
        )
        .with_default(|| None::<T>)
    }
}

fn box_get<T: 'static>(value: &dyn Any) -> Option<&dyn Any> {
    value.downcast_ref::<Box<T>>().map(|boxed| &**boxed as &dyn Any)
}

fn box_wrap<T: 'static>(value: Box<dyn Any>) -> Result<Box<dyn Any>, MapError> {
    Ok(Box::new(Box::new(downcast::<T>(value)?)))
}

impl<T: Ionic> Ionic for Box<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new(
            "Box",
            "",
            Kind::Indirect(IndirectShape {
                inner: TypeHandle::of::<T>(),
                get: box_get::<T>,
                wrap: box_wrap::<T>,
            }),
        )
    }
}

fn arc_get<T: 'static>(value: &dyn Any) -> Option<&dyn Any> {
    value.downcast_ref::<Arc<T>>().map(|shared| &**shared as &dyn Any)
}

fn arc_wrap<T: 'static>(value: Box<dyn Any>) -> Result<Box<dyn Any>, MapError> {
    Ok(Box::new(Arc::new(downcast::<T>(value)?)))
}

impl<T: Ionic> Ionic for Arc<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new(
            "Arc",
            "",
            Kind::Indirect(IndirectShape {
                inner: TypeHandle::of::<T>(),
                get: arc_get::<T>,
                wrap: arc_wrap::<T>,
            }),
        )
    }
}
