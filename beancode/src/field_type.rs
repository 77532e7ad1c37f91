//! The closed set of wire encodings and their 1-byte tag ids.
//!
//! The id table is a frozen contract: ids are never renumbered and new
//! encodings may only be appended. Ids outside the table are rejected by the
//! decoder rather than guessed at.

/// Wire encoding of a single field. The discriminant is the tag id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    PInt = 0,
    PBoolean = 1,
    PByte = 2,
    PChar = 3,
    PDouble = 4,
    PFloat = 5,
    PLong = 6,
    PShort = 7,
    String = 8,
    Date = 9,
    Integer = 10,
    Boolean = 11,
    Byte = 12,
    Character = 13,
    Double = 14,
    Float = 15,
    Long = 16,
    Short = 17,
    Externalizable = 18,
    StringArray = 19,
    DateArray = 20,
    PIntArray = 21,
    PByteArray = 22,
    PDoubleArray = 23,
    PFloatArray = 24,
    PLongArray = 25,
    ListOfExternalizables = 26,
    ExternalizableArray = 27,
    ExternalizableArrayArray = 28,
    Object = 29,
    Uuid = 30,
    StringArrayArray = 31,
    DateArrayArray = 32,
    PIntArrayArray = 33,
    PByteArrayArray = 34,
    PDoubleArrayArray = 35,
    PFloatArrayArray = 36,
    PLongArrayArray = 37,
    Enum = 38,
    EnumSet = 39,
    ListOfStrings = 40,
}

impl FieldType {
    /// The 1-byte tag id written to the wire.
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Reverse lookup by tag id.
    pub const fn from_id(id: u8) -> Option<FieldType> {
        use FieldType::*;
        Some(match id {
            0 => PInt,
            1 => PBoolean,
            2 => PByte,
            3 => PChar,
            4 => PDouble,
            5 => PFloat,
            6 => PLong,
            7 => PShort,
            8 => String,
            9 => Date,
            10 => Integer,
            11 => Boolean,
            12 => Byte,
            13 => Character,
            14 => Double,
            15 => Float,
            16 => Long,
            17 => Short,
            18 => Externalizable,
            19 => StringArray,
            20 => DateArray,
            21 => PIntArray,
            22 => PByteArray,
            23 => PDoubleArray,
            24 => PFloatArray,
            25 => PLongArray,
            26 => ListOfExternalizables,
            27 => ExternalizableArray,
            28 => ExternalizableArrayArray,
            29 => Object,
            30 => Uuid,
            31 => StringArrayArray,
            32 => DateArrayArray,
            33 => PIntArrayArray,
            34 => PByteArrayArray,
            35 => PDoubleArrayArray,
            36 => PFloatArrayArray,
            37 => PLongArrayArray,
            38 => Enum,
            39 => EnumSet,
            40 => ListOfStrings,
            _ => return None,
        })
    }

    /// Whether this encoding's payload is preceded by a 4-byte length,
    /// allowing the decoder to skip it blindly when the field is unknown.
    ///
    /// Every other encoding is either fixed-width or carries inline element
    /// counts; an unknown field of such an encoding is read and discarded.
    #[inline]
    pub const fn is_length_dynamic(self) -> bool {
        matches!(
            self,
            FieldType::Externalizable
                | FieldType::ExternalizableArray
                | FieldType::ExternalizableArrayArray
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_table_is_frozen() {
        // Appending is allowed; renumbering is a wire break.
        let table = [
            (FieldType::PInt, 0),
            (FieldType::PBoolean, 1),
            (FieldType::PByte, 2),
            (FieldType::PChar, 3),
            (FieldType::PDouble, 4),
            (FieldType::PFloat, 5),
            (FieldType::PLong, 6),
            (FieldType::PShort, 7),
            (FieldType::String, 8),
            (FieldType::Date, 9),
            (FieldType::Integer, 10),
            (FieldType::Boolean, 11),
            (FieldType::Byte, 12),
            (FieldType::Character, 13),
            (FieldType::Double, 14),
            (FieldType::Float, 15),
            (FieldType::Long, 16),
            (FieldType::Short, 17),
            (FieldType::Externalizable, 18),
            (FieldType::StringArray, 19),
            (FieldType::DateArray, 20),
            (FieldType::PIntArray, 21),
            (FieldType::PByteArray, 22),
            (FieldType::PDoubleArray, 23),
            (FieldType::PFloatArray, 24),
            (FieldType::PLongArray, 25),
            (FieldType::ListOfExternalizables, 26),
            (FieldType::ExternalizableArray, 27),
            (FieldType::ExternalizableArrayArray, 28),
            (FieldType::Object, 29),
            (FieldType::Uuid, 30),
            (FieldType::StringArrayArray, 31),
            (FieldType::DateArrayArray, 32),
            (FieldType::PIntArrayArray, 33),
            (FieldType::PByteArrayArray, 34),
            (FieldType::PDoubleArrayArray, 35),
            (FieldType::PFloatArrayArray, 36),
            (FieldType::PLongArrayArray, 37),
            (FieldType::Enum, 38),
            (FieldType::EnumSet, 39),
            (FieldType::ListOfStrings, 40),
        ];
        for (ft, id) in table {
            assert_eq!(ft.id(), id);
            assert_eq!(FieldType::from_id(id), Some(ft));
        }
    }

    #[test]
    fn unknown_ids_have_no_mapping() {
        for id in 41..=u8::MAX {
            assert_eq!(FieldType::from_id(id), None);
        }
    }

    #[test]
    fn length_dynamic_set_is_exactly_the_nested_record_encodings() {
        for id in 0..=40 {
            let ft = FieldType::from_id(id).unwrap();
            assert_eq!(ft.is_length_dynamic(), matches!(id, 18 | 27 | 28));
        }
    }
}
