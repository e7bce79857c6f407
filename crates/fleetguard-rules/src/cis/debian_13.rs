//! CIS Debian 13 - 1.1.1.x filesystem kernel modules

use crate::RuleRegistry;
use fleetguard_core::{DesiredState, Feature, Profile, Result, Rule, RuleContext};

/// modprobe configuration file the rules write to
pub const MODPROBE_CONF: &str = "/etc/modprobe.d/cis.conf";

const LEVEL_1: &[Profile] = &[Profile::ServerL1, Profile::WorkstationL1];
const LEVEL_2: &[Profile] = &[Profile::ServerL2, Profile::WorkstationL2];
const SERVER_1_WORKSTATION_2: &[Profile] = &[Profile::ServerL1, Profile::WorkstationL2];

struct ModuleRule {
    id: &'static str,
    module: &'static str,
    profiles: &'static [Profile],
    affects: &'static [Feature],
}

const MODULE_RULES: [ModuleRule; 10] = [
    ModuleRule {
        id: "1.1.1.1",
        module: "cramfs",
        profiles: LEVEL_1,
        affects: &[],
    },
    ModuleRule {
        id: "1.1.1.2",
        module: "freevxfs",
        profiles: LEVEL_1,
        affects: &[],
    },
    ModuleRule {
        id: "1.1.1.3",
        module: "hfs",
        profiles: LEVEL_1,
        affects: &[],
    },
    ModuleRule {
        id: "1.1.1.4",
        module: "hfsplus",
        profiles: LEVEL_1,
        affects: &[],
    },
    ModuleRule {
        id: "1.1.1.5",
        module: "jffs2",
        profiles: LEVEL_1,
        affects: &[],
    },
    ModuleRule {
        id: "1.1.1.6",
        module: "overlay",
        profiles: LEVEL_2,
        affects: &[Feature::Containers],
    },
    ModuleRule {
        id: "1.1.1.7",
        module: "squashfs",
        profiles: LEVEL_2,
        affects: &[Feature::Snap],
    },
    ModuleRule {
        id: "1.1.1.8",
        module: "udf",
        profiles: LEVEL_2,
        affects: &[Feature::PhysicalMedia],
    },
    ModuleRule {
        id: "1.1.1.9",
        module: "firewire-core",
        profiles: SERVER_1_WORKSTATION_2,
        affects: &[],
    },
    ModuleRule {
        id: "1.1.1.10",
        module: "usb-storage",
        profiles: SERVER_1_WORKSTATION_2,
        affects: &[Feature::UsbStorage],
    },
];

/// Lists filesystem modules shipped with the running kernel that are neither
/// in use nor disabled through modprobe configuration.
const UNUSED_FILESYSTEMS_AUDIT: &str = r#"
kernel_dir="/lib/modules/$(uname -r)/kernel/fs"
if [ ! -d "$kernel_dir" ]; then
    echo "no module tree at $kernel_dir"
    exit 0
fi
mounted="$(awk '{print $3}' /proc/mounts | sort -u)"
config="$(modprobe --showconfig 2>/dev/null)"
loaded="$(lsmod | awk 'NR > 1 {print $1}')"
find "$kernel_dir" -type f -name '*.ko*' | while read -r path; do
    mod="$(basename "$path" | sed -E 's/\.ko(\.[a-z]+)?$//')"
    printf '%s\n' "$mounted" | grep -qx "$mod" && continue
    if printf '%s\n' "$config" | grep -Eq "^(install $mod /bin/(false|true)|blacklist $mod)$"; then
        continue
    fi
    status="not disabled"
    if printf '%s\n' "$loaded" | grep -qx "$(printf '%s' "$mod" | tr '-' '_')"; then
        status="loaded"
    fi
    echo "$mod: $status"
done
"#;

/// Remove a kernel module and keep it from being loaded again
pub fn disable_kernel_module(ctx: &mut RuleContext<'_>, module: &str) {
    ctx.declare(DesiredState::kernel_module_absent(module));
    ctx.declare(DesiredState::line_present(
        MODPROBE_CONF,
        format!("install {} /bin/false", module),
    ));
    ctx.declare(DesiredState::line_present(
        MODPROBE_CONF,
        format!("blacklist {}", module),
    ));
}

fn module_rule(entry: &ModuleRule) -> Rule {
    let module = entry.module;
    let mut rule = Rule::new(
        entry.id,
        format!("Ensure {} kernel module is not available", module),
        move |ctx| {
            disable_kernel_module(ctx, module);
            Ok(())
        },
    )
    .with_profiles(entry.profiles.iter().copied());

    for feature in entry.affects {
        rule = rule.affects(*feature);
    }
    rule
}

fn unused_filesystems_rule() -> Rule {
    Rule::new(
        "1.1.1.11",
        "Ensure unused filesystems kernel modules are not available",
        |ctx| {
            ctx.declare(DesiredState::audit(
                "unused filesystem kernel modules",
                UNUSED_FILESYSTEMS_AUDIT.trim(),
            ));
            Ok(())
        },
    )
    .with_profiles(LEVEL_1.iter().copied())
    .audit_only()
}

/// All 1.1.1.x rules in benchmark order
pub fn rules() -> Vec<Rule> {
    let mut rules: Vec<Rule> = MODULE_RULES.iter().map(module_rule).collect();
    rules.push(unused_filesystems_rule());
    rules
}

/// Register the 1.1.1.x rules
pub fn register(registry: &mut RuleRegistry) -> Result<()> {
    for rule in rules() {
        registry.register(rule)?;
    }
    Ok(())
}
