use log::info;
use mstat::{Cgroup, SystemCapabilities, util};

pub fn check_requirements() {
    let root = mstat::cgroup_root_path();
    info!("Checking mstat requirements against {}", root.display());
    println!("Checking mstat requirements...\n");

    let caps = SystemCapabilities::detect_at(&root);
    println!("{}", caps.summary());

    if caps.can_measure() {
        println!(
            "\nReady: a cgroup such as {} can be created",
            root.join(Cgroup::unique_name()).display()
        );
    } else if !caps.has_root {
        println!(
            "\nNot ready: run as root or delegate {} to this user",
            root.display()
        );
    } else {
        println!("\nNot ready: the memory controller of cgroup v2 is required");
    }

    println!("\nSystem info:");
    println!("  UID: {}", util::get_uid());
    println!("  GID: {}", util::get_gid());
    println!("  Cgroup root: {}", root.display());
}
