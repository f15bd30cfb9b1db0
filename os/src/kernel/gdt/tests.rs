//! GDT encoding and layout tests

use x86_64::PrivilegeLevel;

use super::descriptor::{encode_segment, encode_segment_286, BYTE_GRANULAR_MAX};
use super::loader::table_register;
use super::*;
use crate::arch::x86::mode::{Long64, Protected16, Protected32};

const SAMPLE_LIMITS: [u32; 9] =
    [0, 1, 0x7FF, 0xFFF, 0x1000, 0x1FFF, 0xF_FFFF, 0x10_0000, 0xFFFF_FFFF];

#[test]
fn granularity_follows_limit() {
    let access = SegmentAccess::data(PrivilegeLevel::Ring0);
    for limit in SAMPLE_LIMITS {
        let descriptor = encode_segment(0, limit, access, OperandSize::Bits32);
        if limit > BYTE_GRANULAR_MAX {
            assert!(descriptor.granularity(), "limit {limit:#x}");
            assert_eq!(descriptor.raw_limit(), limit >> 12, "limit {limit:#x}");
        } else {
            assert!(!descriptor.granularity(), "limit {limit:#x}");
            assert_eq!(descriptor.raw_limit(), limit, "limit {limit:#x}");
        }
    }
}

#[test]
fn flat_4gib_code_segment() {
    let descriptor = encode_segment(
        0,
        0xFFFF_FFFF,
        SegmentAccess::code(PrivilegeLevel::Ring0),
        OperandSize::Bits32,
    );
    assert_eq!(descriptor.raw(), 0x00CF_9A00_0000_FFFF);
    assert_eq!(descriptor.limit(), 0xFFFF_FFFF);
}

#[test]
fn base_is_split_across_both_fields() {
    let descriptor = encode_segment(
        0x1234_5678,
        0x100,
        SegmentAccess::data(PrivilegeLevel::Ring3),
        OperandSize::Bits16,
    );
    assert_eq!(descriptor.base(), 0x1234_5678);
    assert_eq!((descriptor.raw() >> 56) as u8, 0x12);
    assert_eq!(descriptor.access().privilege(), PrivilegeLevel::Ring3);
    assert_eq!(descriptor.access().bits(), 0xF2);
    assert!(descriptor.flags().is_empty());
}

#[test]
fn size_flags_are_exclusive() {
    let access = SegmentAccess::code(PrivilegeLevel::Ring0);
    let long = encode_segment(0, 0, access, OperandSize::Bits64).flags();
    let wide = encode_segment(0, 0, access, OperandSize::Bits32).flags();
    let narrow = encode_segment(0, 0, access, OperandSize::Bits16).flags();

    assert_eq!(long, SegmentFlags::LONG_MODE);
    assert_eq!(wide, SegmentFlags::DEFAULT_SIZE);
    assert_eq!(narrow, SegmentFlags::empty());
}

#[test]
fn segment_286_has_no_upper_word() {
    let descriptor =
        encode_segment_286(0x0B_8000, 0xFFFF, SegmentAccess::data(PrivilegeLevel::Ring0));
    assert_eq!(descriptor.raw() >> 48, 0);
    assert_eq!(descriptor.base(), 0x0B_8000);
    assert_eq!(descriptor.limit(), 0xFFFF);
    assert!(descriptor.is_present());
}

#[test]
fn selectors_follow_slot_order() {
    for gdt in [build_gdt::<Protected16>(), build_gdt::<Protected32>(), build_gdt::<Long64>()] {
        assert_eq!(gdt.entries()[0], SegmentDescriptor::NULL);
        assert_eq!(gdt.selector(SegmentRole::KernelCode), Some(KERNEL_CODE_SELECTOR));
        assert_eq!(gdt.selector(SegmentRole::KernelData), Some(KERNEL_DATA_SELECTOR));
        assert_eq!(KERNEL_CODE_SELECTOR.0, 0x08);
        assert_eq!(KERNEL_DATA_SELECTOR.0, 0x10);

        for (index, descriptor) in gdt.entries().iter().enumerate().skip(1) {
            assert!(descriptor.is_present(), "slot {index}");
        }
    }
}

#[test]
fn video_alias_only_in_286_layout() {
    let gdt = build_gdt::<Protected16>();
    assert_eq!(gdt.entries().len(), 6);
    assert_eq!(gdt.offset_of(SegmentRole::KernelVideo), Some(0x18));
    assert_eq!(gdt.offset_of(SegmentRole::UserCode), Some(0x20));
    assert_eq!(gdt.offset_of(SegmentRole::UserData), Some(0x28));

    let video = gdt
        .selector(SegmentRole::KernelVideo)
        .and_then(|selector| gdt.descriptor(selector))
        .unwrap();
    assert_eq!(video.base(), 0x0B_8000);

    for gdt in [build_gdt::<Protected32>(), build_gdt::<Long64>()] {
        assert_eq!(gdt.entries().len(), 5);
        assert_eq!(gdt.offset_of(SegmentRole::KernelVideo), None);
        assert_eq!(gdt.offset_of(SegmentRole::UserCode), Some(0x18));
        assert_eq!(gdt.offset_of(SegmentRole::UserData), Some(0x20));
    }
}

#[test]
fn user_selectors_carry_ring3() {
    let gdt = build_gdt::<Long64>();
    let user_code = gdt.selector(SegmentRole::UserCode).unwrap();
    let user_data = gdt.selector(SegmentRole::UserData).unwrap();
    assert_eq!(user_code.0, 0x1B);
    assert_eq!(user_data.0, 0x23);
    assert_eq!(user_code.rpl(), PrivilegeLevel::Ring3);
}

#[test]
fn long_mode_layout() {
    let gdt = build_gdt::<Long64>();
    let code = gdt.descriptor(KERNEL_CODE_SELECTOR).unwrap();
    let data = gdt.descriptor(KERNEL_DATA_SELECTOR).unwrap();

    assert!(code.access().is_code());
    assert!(code.flags().contains(SegmentFlags::LONG_MODE));
    assert!(!code.flags().contains(SegmentFlags::DEFAULT_SIZE));
    assert!(!data.access().is_code());
    assert_eq!(code.raw(), 0x0020_9A00_0000_0000);
    assert_eq!(data.raw(), 0x0000_9200_0000_0000);
}

#[test]
fn protected32_layout_is_flat() {
    let gdt = build_gdt::<Protected32>();
    for descriptor in &gdt.entries()[1..] {
        assert_eq!(descriptor.base(), 0);
        assert_eq!(descriptor.limit(), 0xFFFF_FFFF);
        assert!(descriptor
            .flags()
            .contains(SegmentFlags::DEFAULT_SIZE | SegmentFlags::GRANULARITY));
    }
}

#[test]
fn table_register_limit_is_size_minus_one() {
    let gdt = build_gdt::<Long64>();
    let gdtr = table_register(0x1000, gdt.size_bytes());
    assert_eq!(gdtr.limit, 5 * 8 - 1);
    assert_eq!(gdtr.base.as_u64(), 0x1000);

    let idtr = table_register(0x2000, 256 * 16);
    assert_eq!(idtr.limit, 0x0FFF);
}
