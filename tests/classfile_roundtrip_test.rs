//! Byte-exact round-trip coverage for the class-file wire format, driven by
//! a golden image of one fully populated class.

use mantle::classfile::{Attribute, ClassFile, ClassLoadError, MethodFormat, VariableFormat};
use mantle::pool::LiteralPool;
use mantle::slot::{self, PrimitiveType};
use std::io::Cursor;

/// A complete class file: 16 string literals and one int literal (44 slots),
/// a class descriptor, three methods (one with a Code attribute), two
/// variables (one with a ConstantValue attribute) and 16 bytecode bytes.
const GOLDEN: [u8; 532] = [
    0x4D, 0x41, 0x4E, 0x54, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x54, 0x65, 0x73, 0x74, 0x43, 0x6C, 0x61, 0x73,
    0x73, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x62, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
    0x2F, 0x74, 0x65, 0x73, 0x74, 0x2F, 0x6E, 0x61, 0x6D, 0x65, 0x73, 0x70, 0x61, 0x63, 0x65, 0x2F,
    0x65, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0B, 0x66, 0x69, 0x72, 0x73, 0x74, 0x4D, 0x65, 0x74,
    0x68, 0x6F, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x65, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0C,
    0x73, 0x65, 0x63, 0x6F, 0x6E, 0x64, 0x4D, 0x65, 0x74, 0x68, 0x6F, 0x64, 0x00, 0x00, 0x00, 0x00,
    0x65, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0B, 0x74, 0x68, 0x69, 0x72, 0x64, 0x4D, 0x65, 0x74,
    0x68, 0x6F, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05,
    0x2F, 0x56, 0x6F, 0x69, 0x64, 0x00, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
    0x2F, 0x49, 0x6E, 0x74, 0x00, 0x00, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06,
    0x2F, 0x46, 0x6C, 0x6F, 0x61, 0x74, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05,
    0x2F, 0x43, 0x68, 0x61, 0x72, 0x00, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07,
    0x2F, 0x53, 0x74, 0x72, 0x69, 0x6E, 0x67, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06,
    0x2F, 0x43, 0x6C, 0x61, 0x73, 0x73, 0x00, 0x00, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0D,
    0x66, 0x69, 0x72, 0x73, 0x74, 0x56, 0x61, 0x72, 0x69, 0x61, 0x62, 0x6C, 0x65, 0x00, 0x00, 0x00,
    0x66, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0E, 0x73, 0x65, 0x63, 0x6F, 0x6E, 0x64, 0x56, 0x61,
    0x72, 0x69, 0x61, 0x62, 0x6C, 0x65, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06,
    0x2F, 0x41, 0x72, 0x72, 0x61, 0x79, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05,
    0x2F, 0x42, 0x6F, 0x6F, 0x6C, 0x00, 0x00, 0x00, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1A,
    0x2F, 0x74, 0x65, 0x73, 0x74, 0x2F, 0x6E, 0x61, 0x6D, 0x65, 0x73, 0x70, 0x61, 0x63, 0x65, 0x2F,
    0x53, 0x75, 0x70, 0x65, 0x72, 0x43, 0x6C, 0x61, 0x73, 0x73, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x02, 0x87, 0x57, 0xB2,
    0x00, 0x65, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00,
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0xCA, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
    0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x2F, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00,
    0x00, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x12, 0x00, 0x00, 0x00, 0x02,
    0x00, 0x00, 0x00, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x0A, 0x01, 0x94,
    0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x07, 0x00, 0x02, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00,
    0x00, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0xF9, 0x00, 0x00, 0x00, 0x0B, 0x00, 0x00,
    0x00, 0x0D, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00,
    0x00, 0x10, 0x02, 0x5E, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x10, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    0x0C, 0x0D, 0x0E, 0x0F,
];

fn build_class_file() -> ClassFile {
    let mut pool = LiteralPool::new();
    let class_name = pool.push_string(PrimitiveType::ClassName, "TestClass");
    let namespace = pool.push_string(PrimitiveType::NamespacePath, "/test/namespace/");
    let method1_name = pool.push_string(PrimitiveType::MethodName, "firstMethod");
    let method2_name = pool.push_string(PrimitiveType::MethodName, "secondMethod");
    let method3_name = pool.push_string(PrimitiveType::MethodName, "thirdMethod");
    let method1_type = pool.push_string(PrimitiveType::ClassPath, "/Void");
    let method2_type = pool.push_string(PrimitiveType::ClassPath, "/Int");
    let method3_type = pool.push_string(PrimitiveType::ClassPath, "/Float");
    let method2_arg = pool.push_string(PrimitiveType::ClassPath, "/Char");
    let method3_arg1 = pool.push_string(PrimitiveType::ClassPath, "/String");
    let method3_arg2 = pool.push_string(PrimitiveType::ClassPath, "/Class");
    let var1_name = pool.push_string(PrimitiveType::VariableName, "firstVariable");
    let var2_name = pool.push_string(PrimitiveType::VariableName, "secondVariable");
    let var1_type = pool.push_string(PrimitiveType::ClassPath, "/Array");
    let var2_type = pool.push_string(PrimitiveType::ClassPath, "/Bool");
    let superclass = pool.push_string(PrimitiveType::ClassPath, "/test/namespace/SuperClass");
    let answer = pool.push_int(42_424_242);
    assert_eq!(pool.slot_count(), 44);

    let mut file = ClassFile::new();
    file.literals = pool;

    file.class_format.flags = 101;
    file.class_format.name_index = class_name;
    file.class_format.namespace_index = namespace;
    file.class_format.superclass_index = superclass;

    file.methods.push(MethodFormat {
        flags: 202,
        name_index: method1_name,
        return_type_index: method1_type,
        ..MethodFormat::default()
    });
    file.methods.push(MethodFormat {
        flags: 303,
        name_index: method2_name,
        return_type_index: method2_type,
        argument_type_indexes: vec![method2_arg],
        attributes: vec![Attribute::Code {
            code_start: 0,
            code_length: 16,
            max_stack: 10,
        }],
    });
    file.methods.push(MethodFormat {
        flags: 404,
        name_index: method3_name,
        return_type_index: method3_type,
        argument_type_indexes: vec![method3_arg1, method3_arg2],
        ..MethodFormat::default()
    });

    file.variables.push(VariableFormat {
        flags: 505,
        name_index: var1_name,
        type_index: var1_type,
        attributes: vec![Attribute::ConstantValue {
            value_index: answer,
        }],
    });
    file.variables.push(VariableFormat {
        flags: 606,
        name_index: var2_name,
        type_index: var2_type,
        attributes: Vec::new(),
    });

    file.bytecode = (0u8..16).collect();
    file
}

#[test]
fn output_matches_golden_image() {
    let file = build_class_file();
    let mut buf = Vec::new();
    file.output(&mut buf).unwrap();
    assert_eq!(buf, GOLDEN);
}

#[test]
fn input_reproduces_the_built_structure() {
    let mut file = ClassFile::new();
    file.input(&mut Cursor::new(&GOLDEN[..])).unwrap();
    assert_eq!(file, build_class_file());
}

#[test]
fn input_then_output_is_identity() {
    let mut file = ClassFile::new();
    file.input(&mut Cursor::new(&GOLDEN[..])).unwrap();

    let mut buf = Vec::new();
    file.output(&mut buf).unwrap();
    assert_eq!(buf, GOLDEN);
}

#[test]
fn literal_lookups_resolve_through_the_pool() {
    let mut file = ClassFile::new();
    file.input(&mut Cursor::new(&GOLDEN[..])).unwrap();

    assert_eq!(slot::get_unsloted_int(file.literal(16).unwrap()).unwrap(), 42_424_242);
    assert_eq!(
        file.literal_string(file.class_format.name_index).unwrap(),
        "TestClass"
    );
    assert_eq!(
        file.literal_string(file.class_format.namespace_index).unwrap(),
        "/test/namespace/"
    );
    assert_eq!(
        file.literal_string(file.class_format.superclass_index).unwrap(),
        "/test/namespace/SuperClass"
    );

    let second = &file.methods[1];
    assert_eq!(file.literal_string(second.name_index).unwrap(), "secondMethod");
    assert_eq!(
        file.literal_string(second.argument_type_index(0).unwrap()).unwrap(),
        "/Char"
    );
    assert_eq!(second.argument_type_index(1), None);
    assert_eq!(
        second.attributes,
        [Attribute::Code {
            code_start: 0,
            code_length: 16,
            max_stack: 10,
        }]
    );

    let first_var = &file.variables[0];
    assert_eq!(
        file.literal_string(first_var.name_index).unwrap(),
        "firstVariable"
    );
    assert_eq!(
        first_var.attributes,
        [Attribute::ConstantValue { value_index: 16 }]
    );
}

#[test]
fn truncated_images_fail_to_load() {
    // Cut points spread over every section of the file.
    for cut in [0, 2, 10, 17, 100, 360, 380, 460, 531] {
        let mut file = ClassFile::new();
        let err = file.input(&mut Cursor::new(&GOLDEN[..cut])).unwrap_err();
        assert!(
            matches!(err, ClassLoadError::Truncated),
            "cut at {cut} gave {err:?}"
        );
    }
}
