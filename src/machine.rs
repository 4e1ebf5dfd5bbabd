use anyhow::{bail, Context, Result};
use simstub_config::MachineConfig;
use simstub_target::{FlatTarget, FlatTargetConfig, TargetAdapter};
use tracing::info;

/// Build the reference machine and load its program image, if any.
///
/// The program counter starts at the load address of the image.
pub(crate) fn build(config: &MachineConfig) -> Result<FlatTarget> {
    let mut target = FlatTarget::new(FlatTargetConfig {
        register_count: config.registers,
        register_width: config.register_width,
        pc_register: config.pc_register,
        big_endian: config.big_endian,
        memory_base: config.memory_base,
        memory_size: config.memory_size,
        instruction_width: config.instruction_width,
        exit_address: config.exit_address,
    });

    if let Some(path) = &config.image {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let address = config.load_address.unwrap_or(config.memory_base);
        let memory_end = config.memory_base.saturating_add(config.memory_size as u64);
        let image_end = address.checked_add(bytes.len() as u64);
        if address < config.memory_base || image_end.map_or(true, |end| end > memory_end) {
            bail!(
                "image {} ({} bytes at {address:#x}) does not fit memory {:#x}..{memory_end:#x}",
                path.display(),
                bytes.len(),
                config.memory_base
            );
        }
        target.load(address, &bytes);
        target.set_program_counter(address);
        info!(
            image = %path.display(),
            bytes = bytes.len(),
            address = format_args!("{address:#x}"),
            "loaded program image"
        );
    }

    Ok(target)
}
