//! In-memory endpoint used by the unit tests.
//!
//! [`FakeEndpoint`] implements [`RemoteGateway`] over a small object store
//! that behaves like a single-datacenter hypervisor: VMs, hosts, datastores,
//! networks, a datastore file tree and asynchronous tasks. Tests can expire
//! sessions, inject faults per operation and script task outcomes, then
//! inspect the journal of invoked methods.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value, json};
use vmops_cli::application::ports::{
    DatastoreFile, ImageTransport, ProgressReporter, RemoteGateway,
};
use vmops_cli::domain::{DatastorePath, Fault, VmopsError};
use vmops_common::{ManagedObjectReference, ObjectContent, ServiceContent, TaskInfo, TaskState};

// ── Operation names used for fault injection ──────────────────────────────────

pub const LOGIN: &str = "Login";
pub const PROPERTY: &str = "RetrieveProperties";
pub const LIST: &str = "RetrieveContents";
pub const SERVICE_CONTENT: &str = "RetrieveServiceContent";

pub const DATACENTER: &str = "datacenter-1";
pub const DATASTORE_1: &str = "datastore1";
pub const DATASTORE_2: &str = "datastore2";

pub fn moref(kind: &str, value: &str) -> ManagedObjectReference {
    ManagedObjectReference::new(kind, value)
}

fn moref_json(kind: &str, value: &str) -> Value {
    json!({ "type": kind, "value": value })
}

// ── World ─────────────────────────────────────────────────────────────────────

struct Object {
    moref: ManagedObjectReference,
    props: BTreeMap<String, Value>,
}

struct Injected {
    op: String,
    fault: Fault,
    remaining: usize,
}

struct TaskScript {
    running_polls: u32,
    info: TaskInfo,
}

#[derive(Default)]
struct World {
    next_id: u64,
    objects: Vec<Object>,
    tasks: HashMap<String, TaskScript>,
    dirs: BTreeSet<String>,
    files: BTreeSet<String>,

    authenticated: HashSet<u64>,
    sessions: HashMap<u64, String>,
    logins: u32,
    terminated: Vec<String>,
    logouts: u32,

    injected: Vec<Injected>,
    task_failures: HashMap<String, String>,
    hanging: HashSet<String>,
    running_polls: u32,

    journal: Vec<(String, Map<String, Value>)>,
    transfers: Vec<String>,
}

impl World {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn add(&mut self, kind: &str, value: &str, props: Value) {
        let props = props
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        self.objects.push(Object {
            moref: moref(kind, value),
            props,
        });
    }

    fn object(&self, obj: &ManagedObjectReference) -> Option<&Object> {
        self.objects.iter().find(|o| &o.moref == obj)
    }

    fn object_mut(&mut self, obj: &ManagedObjectReference) -> Option<&mut Object> {
        self.objects.iter_mut().find(|o| &o.moref == obj)
    }

    fn vm_by_name(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| {
            o.moref.is_kind("VirtualMachine")
                && o.props.get("name").and_then(Value::as_str) == Some(name)
        })
    }

    fn datastore_named(&self, name: &str) -> Option<ManagedObjectReference> {
        self.objects
            .iter()
            .find(|o| {
                o.moref.is_kind("Datastore")
                    && o.props.get("summary.name").and_then(Value::as_str) == Some(name)
            })
            .map(|o| o.moref.clone())
    }

    fn take_fault(&mut self, op: &str) -> Option<Fault> {
        let slot = self
            .injected
            .iter_mut()
            .find(|i| i.op == op && i.remaining > 0)?;
        slot.remaining -= 1;
        Some(slot.fault.clone())
    }

    fn check(&mut self, conn: u64, op: &str) -> Result<(), Fault> {
        if let Some(fault) = self.take_fault(op) {
            return Err(fault);
        }
        if self.authenticated.contains(&conn) {
            Ok(())
        } else {
            Err(Fault::not_authenticated())
        }
    }

    fn start_task(&mut self, method: &str, outcome: Result<Option<Value>, String>) -> Value {
        let id = self.next("task");
        let info = match outcome {
            Ok(result) => TaskInfo {
                result,
                ..TaskInfo::new(method, TaskState::Success)
            },
            Err(message) => TaskInfo::new(method, TaskState::Error).with_error(message),
        };
        let running_polls = if self.hanging.contains(method) {
            u32::MAX
        } else {
            self.running_polls
        };
        self.tasks.insert(
            id.clone(),
            TaskScript {
                running_polls,
                info,
            },
        );
        moref_json("Task", &id)
    }

    fn poll_task(&mut self, id: &str) -> Value {
        let Some(script) = self.tasks.get_mut(id) else {
            return Value::Null;
        };
        if script.running_polls > 0 {
            script.running_polls = script.running_polls.saturating_sub(1);
            return serde_json::to_value(TaskInfo::new(script.info.name.clone(), TaskState::Running))
                .unwrap();
        }
        serde_json::to_value(&script.info).unwrap()
    }

    fn parent_exists(&self, path: &str) -> bool {
        DatastorePath::parse(path).is_some_and(|p| {
            let parent = p.parent();
            parent.is_root() || self.dirs.contains(&parent.to_string())
        })
    }

    // ── Method simulation ─────────────────────────────────────────────────────

    fn invoke(
        &mut self,
        target: &ManagedObjectReference,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, Fault> {
        if let Some(message) = self.task_failures.get(method).cloned() {
            return Ok(self.start_task(method, Err(message)));
        }
        let arg = |name: &str| args.get(name).cloned().unwrap_or(Value::Null);
        let arg_str = |name: &str| args.get(name).and_then(Value::as_str).unwrap_or_default().to_string();

        match method {
            "CreateVM_Task" => {
                let outcome = self.create_vm(&arg("config"), &arg("pool"));
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "ReconfigVM_Task" => {
                let outcome = self.reconfigure(target, &arg("spec"));
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "PowerOnVM_Task" => {
                let outcome = self.set_power(target, &["poweredOff", "suspended"], "poweredOn");
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "PowerOffVM_Task" => {
                let outcome = self.set_power(target, &["poweredOn", "suspended"], "poweredOff");
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "SuspendVM_Task" => {
                let outcome = self.set_power(target, &["poweredOn"], "suspended");
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "ResetVM_Task" => {
                let outcome = self.set_power(target, &["poweredOn"], "poweredOn");
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "RebootGuest" => {
                let vm = self
                    .object(target)
                    .ok_or_else(|| missing_object(target))?;
                if vm.props.get("summary.guest.toolsRunningStatus").and_then(Value::as_str)
                    != Some("guestToolsRunning")
                {
                    return Err(Fault::from_server(
                        vec!["ToolsUnavailable".into()],
                        "VMware Tools is not running",
                    ));
                }
                Ok(Value::Null)
            }
            "UnregisterVM" => {
                self.object(target).ok_or_else(|| missing_object(target))?;
                self.objects.retain(|o| &o.moref != target);
                Ok(Value::Null)
            }
            "Rename_Task" => {
                let new_name = arg_str("newName");
                let outcome = match self.object_mut(target) {
                    Some(obj) => {
                        obj.props.insert("name".into(), json!(new_name));
                        Ok(None)
                    }
                    None => Err(format!("object {target} was deleted")),
                };
                Ok(self.start_task(method, outcome))
            }
            "CloneVM_Task" => {
                let outcome = self.clone_vm(target, &arg_str("name"), &arg("spec"));
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "Destroy_Task" => {
                let outcome = match self.object(target) {
                    Some(_) => {
                        self.objects.retain(|o| &o.moref != target);
                        Ok(None)
                    }
                    None => Err(format!("object {target} was deleted")),
                };
                Ok(self.start_task(method, outcome))
            }
            "MigrateVM_Task" => {
                let host = arg("host");
                let outcome = match self.object_mut(target) {
                    Some(obj) => {
                        obj.props.insert("runtime.host".into(), host);
                        Ok(None)
                    }
                    None => Err(format!("object {target} was deleted")),
                };
                Ok(self.start_task(method, outcome))
            }
            "CreateSnapshot_Task" => {
                let name = arg("name");
                let outcome = match self.object_mut(target) {
                    Some(obj) => {
                        let snapshots = obj
                            .props
                            .entry("snapshot".into())
                            .or_insert_with(|| json!([]));
                        if let Some(list) = snapshots.as_array_mut() {
                            list.push(name);
                        }
                        Ok(None)
                    }
                    None => Err(format!("object {target} was deleted")),
                };
                Ok(self.start_task(method, outcome))
            }
            "SearchDatastore_Task" => {
                let outcome = self.search(&arg_str("datastorePath"), &arg("searchSpec"));
                Ok(self.start_task(method, outcome.map(Some)))
            }
            "MakeDirectory" => {
                let name = arg_str("name");
                if self.dirs.contains(&name) {
                    return Err(Fault::from_server(
                        vec!["FileAlreadyExists".into()],
                        format!("Cannot complete the operation because the file or folder {name} already exists"),
                    ));
                }
                if !self.parent_exists(&name) {
                    return Err(Fault::from_server(
                        vec!["FileNotFound".into()],
                        format!("File {name} was not found"),
                    ));
                }
                self.dirs.insert(name);
                Ok(Value::Null)
            }
            "DeleteDatastoreFile_Task" => {
                let outcome = self.delete_path(&arg_str("name"));
                Ok(self.start_task(method, outcome.map(|()| None)))
            }
            "CreateVirtualDisk_Task" => {
                let name = arg_str("name");
                let outcome = if self.parent_exists(&name) {
                    self.add_disk_files(&name);
                    Ok(None)
                } else {
                    Err(format!("File {name} was not found"))
                };
                Ok(self.start_task(method, outcome))
            }
            "CopyVirtualDisk_Task" => {
                let source = arg_str("sourceName");
                let dest = arg_str("destName");
                let outcome = if !self.files.contains(&source) {
                    Err(format!("File {source} was not found"))
                } else if !self.parent_exists(&dest) {
                    Err(format!("File {dest} was not found"))
                } else {
                    self.add_disk_files(&dest);
                    Ok(None)
                };
                Ok(self.start_task(method, outcome))
            }
            "DeleteVirtualDisk_Task" => {
                let name = arg_str("name");
                let outcome = if self.files.remove(&name) {
                    self.files.remove(&flat_of(&name));
                    Ok(None)
                } else {
                    Err(format!("File {name} was not found"))
                };
                Ok(self.start_task(method, outcome))
            }
            "AddPortGroup" => self.add_port_group(target, &arg("portgrp")),
            other => Err(Fault::from_server(
                vec!["MethodNotFound".into()],
                format!("{other} is not supported by the fake endpoint"),
            )),
        }
    }

    fn create_vm(&mut self, config: &Value, _pool: &Value) -> Result<(), String> {
        let name = config["name"].as_str().unwrap_or_default().to_string();
        if self.vm_by_name(&name).is_some() {
            return Err(format!("The name '{name}' already exists."));
        }
        let root = config["files"]["vmPathName"].as_str().unwrap_or_default();
        let ds_path = DatastorePath::parse(root).ok_or_else(|| format!("invalid path {root}"))?;
        let datastore = self
            .datastore_named(&ds_path.datastore)
            .ok_or_else(|| format!("datastore {} not found", ds_path.datastore))?;
        let folder = ds_path.join(&name);
        let vmx = folder.join(&format!("{name}.vmx"));
        self.dirs.insert(folder.to_string());
        self.files.insert(vmx.to_string());

        let id = self.next("vm");
        self.add(
            "VirtualMachine",
            &id,
            json!({
                "name": name,
                "runtime.powerState": "poweredOff",
                "runtime.connectionState": "connected",
                "config.files.vmPathName": vmx.to_string(),
                "config.hardware.device": [
                    { "kind": "VirtualIDEController", "key": 200 },
                ],
                "summary.config.numCpu": config["numCPUs"],
                "summary.config.memorySizeMB": config["memoryMB"],
                "summary.guest.toolsStatus": "toolsNotInstalled",
                "summary.guest.toolsRunningStatus": "guestToolsNotRunning",
                "datastore": [datastore],
                "guestId": config["guestId"],
            }),
        );
        Ok(())
    }

    fn reconfigure(&mut self, target: &ManagedObjectReference, spec: &Value) -> Result<(), String> {
        let vm_name = self
            .object(target)
            .and_then(|o| o.props.get("name").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| format!("object {target} was deleted"))?;
        let vmx_folder = self
            .object(target)
            .and_then(|o| o.props.get("config.files.vmPathName").and_then(Value::as_str))
            .and_then(DatastorePath::parse)
            .map(|p| p.parent());

        let mut keys: HashMap<i64, i64> = HashMap::new();
        let mut added = Vec::new();
        for change in spec["deviceChange"].as_array().cloned().unwrap_or_default() {
            let mut device = change["device"].clone();
            let temp_key = device["key"].as_i64().unwrap_or_default();
            self.next_id += 1;
            let real_key = 1000 + i64::try_from(self.next_id).unwrap_or_default();
            keys.insert(temp_key, real_key);
            device["key"] = json!(real_key);
            if let Some(ck) = device["controllerKey"].as_i64() {
                device["controllerKey"] = json!(keys.get(&ck).copied().unwrap_or(ck));
            }

            let backing = device["backing"].clone();
            if backing["kind"] == "VirtualDiskFlatVer2BackingInfo" {
                if change["fileOperation"] == "create" {
                    let parent = backing["parent"]["fileName"].as_str().unwrap_or_default();
                    if !self.files.contains(parent) {
                        return Err(format!("File {parent} was not found"));
                    }
                    let folder = vmx_folder.clone().ok_or("VM has no folder")?;
                    let delta = folder.join(&format!("{vm_name}.vmdk")).to_string();
                    self.files.insert(delta.clone());
                    device["backing"]["fileName"] = json!(delta);
                } else {
                    let file = backing["fileName"].as_str().unwrap_or_default();
                    if !self.files.contains(file) {
                        return Err(format!("File {file} was not found"));
                    }
                }
            }
            added.push(device);
        }

        let obj = self
            .object_mut(target)
            .ok_or_else(|| format!("object {target} was deleted"))?;
        let devices = obj
            .props
            .entry("config.hardware.device".into())
            .or_insert_with(|| json!([]));
        if let Some(list) = devices.as_array_mut() {
            list.extend(added);
        }
        if let Some(extra) = spec["extraConfig"].as_array().filter(|e| !e.is_empty()) {
            obj.props
                .insert("config.extraConfig".into(), Value::Array(extra.clone()));
        }
        Ok(())
    }

    fn set_power(
        &mut self,
        target: &ManagedObjectReference,
        from: &[&str],
        to: &str,
    ) -> Result<(), String> {
        let obj = self
            .object_mut(target)
            .ok_or_else(|| format!("object {target} was deleted"))?;
        let current = obj
            .props
            .get("runtime.powerState")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !from.contains(&current.as_str()) {
            return Err(format!(
                "The attempted operation cannot be performed in the current state ({current})."
            ));
        }
        obj.props.insert("runtime.powerState".into(), json!(to));
        Ok(())
    }

    fn clone_vm(
        &mut self,
        source: &ManagedObjectReference,
        name: &str,
        spec: &Value,
    ) -> Result<(), String> {
        if self.vm_by_name(name).is_some() {
            return Err(format!("The name '{name}' already exists."));
        }
        let mut props = self
            .object(source)
            .map(|o| o.props.clone())
            .ok_or_else(|| format!("object {source} was deleted"))?;
        props.insert("name".into(), json!(name));
        let power = if spec["powerOn"].as_bool() == Some(true) {
            "poweredOn"
        } else {
            "poweredOff"
        };
        props.insert("runtime.powerState".into(), json!(power));
        props.insert("runtime.host".into(), spec["location"]["host"].clone());
        props.insert(
            "datastore".into(),
            json!([spec["location"]["datastore"].clone()]),
        );
        let id = self.next("vm");
        self.objects.push(Object {
            moref: moref("VirtualMachine", &id),
            props,
        });
        Ok(())
    }

    fn search(&self, folder: &str, spec: &Value) -> Result<Value, String> {
        let exists = DatastorePath::parse(folder)
            .is_some_and(|p| p.is_root() || self.dirs.contains(folder));
        if !exists {
            return Err(format!("File {folder} was not found"));
        }
        let patterns: Vec<&str> = spec["matchPattern"]
            .as_array()
            .map(|p| p.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let prefix = format!("{folder}/");
        let found: Vec<Value> = self
            .files
            .iter()
            .filter_map(|f| f.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .filter(|rest| patterns.is_empty() || patterns.contains(rest))
            .map(|rest| json!({ "path": rest }))
            .collect();
        Ok(json!({ "folderPath": folder, "file": found }))
    }

    fn delete_path(&mut self, name: &str) -> Result<(), String> {
        if self.dirs.remove(name) {
            let prefix = format!("{name}/");
            self.files.retain(|f| !f.starts_with(&prefix));
            self.dirs.retain(|d| !d.starts_with(&prefix));
            Ok(())
        } else if self.files.remove(name) {
            Ok(())
        } else {
            Err(format!("File {name} was not found"))
        }
    }

    fn add_disk_files(&mut self, descriptor: &str) {
        self.files.insert(descriptor.to_string());
        self.files.insert(flat_of(descriptor));
    }

    fn add_port_group(
        &mut self,
        network_system: &ManagedObjectReference,
        spec: &Value,
    ) -> Result<Value, Fault> {
        let name = spec["name"].as_str().unwrap_or_default().to_string();
        let system = serde_json::to_value(network_system).unwrap();
        let host = self
            .objects
            .iter()
            .find(|o| o.props.get("configManager.networkSystem") == Some(&system))
            .map(|o| o.moref.clone())
            .ok_or_else(|| missing_object(network_system))?;

        let exists = self
            .object(&host)
            .and_then(|h| h.props.get("config.network.portgroup"))
            .and_then(Value::as_array)
            .is_some_and(|groups| groups.iter().any(|g| g["spec"]["name"] == name.as_str()));
        if exists {
            return Err(Fault::already_exists(format!(
                "The specified key, name, or identifier '{name}' already exists."
            )));
        }

        let id = self.next("network");
        self.add("Network", &id, json!({ "summary.name": name }));
        let obj = self.object_mut(&host).ok_or_else(|| missing_object(network_system))?;
        push(
            &mut obj.props,
            "config.network.portgroup",
            json!({ "spec": { "name": name, "vlanId": spec["vlanId"], "vswitchName": spec["vswitchName"] } }),
        );
        push(&mut obj.props, "network", moref_json("Network", &id));
        Ok(Value::Null)
    }
}

fn push(props: &mut BTreeMap<String, Value>, key: &str, value: Value) {
    if let Some(list) = props
        .entry(key.to_string())
        .or_insert_with(|| json!([]))
        .as_array_mut()
    {
        list.push(value);
    }
}

fn flat_of(descriptor: &str) -> String {
    match descriptor.strip_suffix(".vmdk") {
        Some(base) => format!("{base}-flat.vmdk"),
        None => format!("{descriptor}-flat"),
    }
}

fn missing_object(obj: &ManagedObjectReference) -> Fault {
    Fault::from_server(
        vec!["ManagedObjectNotFound".into()],
        format!("The object '{obj}' has already been deleted or has not been completely created"),
    )
}

// ── FakeEndpoint ──────────────────────────────────────────────────────────────

/// Shared handle to the simulated endpoint. Clones see the same world.
#[derive(Clone, Default)]
pub struct FakeEndpoint {
    world: Arc<Mutex<World>>,
}

impl FakeEndpoint {
    /// One datacenter with two hosts (`esx01`, `esx02`), each with its own
    /// VMFS datastore, a standard `br-int` network on `esx01` and a resource
    /// pool.
    pub fn standard() -> Self {
        let endpoint = Self::default();
        {
            let mut w = endpoint.world();
            w.running_polls = 1;
            w.add(
                "Datacenter",
                DATACENTER,
                json!({ "name": "ha-datacenter", "vmFolder": moref_json("Folder", "group-v1") }),
            );
            w.add("ResourcePool", "resgroup-1", json!({}));
            for (i, ds_name) in [(1, DATASTORE_1), (2, DATASTORE_2)] {
                let networks = if i == 1 {
                    json!([moref_json("Network", "network-1")])
                } else {
                    json!([])
                };
                w.add(
                    "Datastore",
                    &format!("datastore-{i}"),
                    json!({
                        "summary.type": "VMFS",
                        "summary.name": ds_name,
                        "summary.accessible": true,
                        "browser": moref_json("HostDatastoreBrowser", &format!("browser-{i}")),
                    }),
                );
                w.add(
                    "HostSystem",
                    &format!("host-{i}"),
                    json!({
                        "name": format!("esx0{i}"),
                        "datastore": [moref_json("Datastore", &format!("datastore-{i}"))],
                        "network": networks,
                        "configManager.networkSystem": moref_json("HostNetworkSystem", &format!("netsys-{i}")),
                        "config.network.pnic": [{ "device": "vmnic0" }, { "device": "vmnic1" }],
                        "config.network.vswitch": [
                            { "name": "vSwitch0", "pnic": ["key-vim.host.PhysicalNic-vmnic0"] },
                        ],
                        "config.network.portgroup": [
                            { "spec": { "name": "br-int", "vlanId": 0, "vswitchName": "vSwitch0" } },
                        ],
                    }),
                );
            }
            w.add("Network", "network-1", json!({ "summary.name": "br-int" }));
        }
        endpoint
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().expect("world lock")
    }

    // ── Scenario setup ────────────────────────────────────────────────────────

    /// Add a VM with a thin root disk on an LSI Logic controller.
    pub fn add_vm(&self, name: &str, power_state: &str) -> ManagedObjectReference {
        let mut w = self.world();
        let id = w.next("vm");
        let folder = format!("[{DATASTORE_1}] {name}");
        let disk = format!("{folder}/{name}.vmdk");
        w.dirs.insert(folder.clone());
        w.files.insert(format!("{folder}/{name}.vmx"));
        w.files.insert(disk.clone());
        w.files.insert(flat_of(&disk));
        w.add(
            "VirtualMachine",
            &id,
            json!({
                "name": name,
                "runtime.powerState": power_state,
                "runtime.connectionState": "connected",
                "runtime.host": moref_json("HostSystem", "host-1"),
                "config.files.vmPathName": format!("{folder}/{name}.vmx"),
                "config.hardware.device": [
                    { "kind": "VirtualIDEController", "key": 200 },
                    { "kind": "VirtualLsiLogicController", "key": 1000 },
                    {
                        "kind": "VirtualDisk", "key": 2000, "controllerKey": 1000, "unitNumber": 0,
                        "backing": {
                            "kind": "VirtualDiskFlatVer2BackingInfo",
                            "fileName": disk,
                            "thinProvisioned": true,
                        },
                    },
                ],
                "summary.config.numCpu": 2,
                "summary.config.memorySizeMB": 2048,
                "summary.guest.toolsStatus": "toolsNotRunning",
                "summary.guest.toolsRunningStatus": "guestToolsNotRunning",
                "datastore": [moref_json("Datastore", "datastore-1")],
            }),
        );
        moref("VirtualMachine", &id)
    }

    /// Set a property on an existing object.
    pub fn set_prop(&self, obj: &ManagedObjectReference, path: &str, value: Value) {
        let mut w = self.world();
        let object = w.object_mut(obj).expect("object exists");
        object.props.insert(path.to_string(), value);
    }

    pub fn add_object(&self, kind: &str, value: &str, props: Value) {
        self.world().add(kind, value, props);
    }

    pub fn add_dir(&self, path: &str) {
        self.world().dirs.insert(path.to_string());
    }

    pub fn add_file(&self, path: &str) {
        self.world().files.insert(path.to_string());
    }

    /// Invalidate every logged-in session, as a server-side timeout would.
    pub fn expire_sessions(&self) {
        self.world().authenticated.clear();
    }

    /// Fail the next `times` calls of `op` with `fault`.
    pub fn inject(&self, op: &str, fault: Fault, times: usize) {
        self.world().injected.push(Injected {
            op: op.to_string(),
            fault,
            remaining: times,
        });
    }

    /// Fail every call of `op` with `fault`.
    pub fn inject_always(&self, op: &str, fault: Fault) {
        self.inject(op, fault, usize::MAX);
    }

    /// Make every task started by `method` end in error with `message`,
    /// without applying its effect.
    pub fn fail_tasks(&self, method: &str, message: &str) {
        self.world()
            .task_failures
            .insert(method.to_string(), message.to_string());
    }

    /// Tasks of `method` never leave the running state.
    pub fn hang_tasks(&self, method: &str) {
        self.world().hanging.insert(method.to_string());
    }

    /// Number of `running` polls every new task reports before finishing.
    pub fn set_running_polls(&self, polls: u32) {
        self.world().running_polls = polls;
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn logins(&self) -> u32 {
        self.world().logins
    }

    pub fn logouts(&self) -> u32 {
        self.world().logouts
    }

    pub fn terminated_sessions(&self) -> Vec<String> {
        self.world().terminated.clone()
    }

    /// Names of invoked methods, in call order.
    pub fn methods(&self) -> Vec<String> {
        self.world().journal.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Arguments of every invocation of `method`.
    pub fn calls(&self, method: &str) -> Vec<Map<String, Value>> {
        self.world()
            .journal
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls(method).len()
    }

    pub fn vm(&self, name: &str) -> Option<ManagedObjectReference> {
        self.world().vm_by_name(name).map(|o| o.moref.clone())
    }

    pub fn vm_names(&self) -> Vec<String> {
        self.world()
            .objects
            .iter()
            .filter(|o| o.moref.is_kind("VirtualMachine"))
            .filter_map(|o| o.props.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    pub fn prop(&self, obj: &ManagedObjectReference, path: &str) -> Value {
        self.world()
            .object(obj)
            .and_then(|o| o.props.get(path).cloned())
            .unwrap_or(Value::Null)
    }

    pub fn power_state(&self, name: &str) -> Option<String> {
        let w = self.world();
        w.vm_by_name(name)
            .and_then(|o| o.props.get("runtime.powerState"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.world().files.contains(path)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.world().dirs.contains(path)
    }

    pub fn files(&self) -> Vec<String> {
        self.world().files.iter().cloned().collect()
    }

    pub fn transfers(&self) -> Vec<String> {
        self.world().transfers.clone()
    }

    pub fn port_groups(&self, host: &str) -> Vec<(String, u64)> {
        self.prop(&moref("HostSystem", host), "config.network.portgroup")
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|g| {
                (
                    g["spec"]["name"].as_str().unwrap_or_default().to_string(),
                    g["spec"]["vlanId"].as_u64().unwrap_or_default(),
                )
            })
            .collect()
    }
}

impl RemoteGateway for FakeEndpoint {
    type Connection = u64;

    async fn open(&self) -> Result<u64, Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        w.next_id += 1;
        Ok(w.next_id)
    }

    async fn login(&self, conn: &u64, username: &str, password: &str) -> Result<String, Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        if let Some(fault) = w.take_fault(LOGIN) {
            return Err(fault);
        }
        if username.is_empty() || password != "secret" {
            return Err(Fault::from_server(
                vec!["InvalidLogin".into()],
                "Cannot complete login due to an incorrect user name or password.",
            ));
        }
        w.logins += 1;
        let key = format!("session-{}", w.logins);
        w.authenticated.insert(*conn);
        w.sessions.insert(*conn, key.clone());
        Ok(key)
    }

    async fn terminate_session(&self, conn: &u64, session_key: &str) -> Result<(), Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        w.check(*conn, "TerminateSession")?;
        w.terminated.push(session_key.to_string());
        let stale: Vec<u64> = w
            .sessions
            .iter()
            .filter(|(_, key)| key.as_str() == session_key)
            .map(|(c, _)| *c)
            .collect();
        for c in stale {
            w.authenticated.remove(&c);
        }
        Ok(())
    }

    async fn logout(&self, conn: &u64) -> Result<(), Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        w.check(*conn, "Logout")?;
        w.authenticated.remove(conn);
        w.logouts += 1;
        Ok(())
    }

    async fn service_content(&self, conn: &u64) -> Result<ServiceContent, Fault> {
        tokio::task::yield_now().await;
        self.world().check(*conn, SERVICE_CONTENT)?;
        Ok(ServiceContent {
            session_manager: moref("SessionManager", "SessionManager"),
            file_manager: moref("FileManager", "FileManager"),
            virtual_disk_manager: moref("VirtualDiskManager", "virtualDiskManager"),
        })
    }

    async fn invoke(
        &self,
        conn: &u64,
        target: &ManagedObjectReference,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        w.check(*conn, method)?;
        w.journal.push((method.to_string(), args.clone()));
        w.invoke(target, method, args)
    }

    async fn get_property(
        &self,
        conn: &u64,
        obj: &ManagedObjectReference,
        path: &str,
    ) -> Result<Value, Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        w.check(*conn, PROPERTY)?;
        if obj.is_kind("Task") && path == "info" {
            return Ok(w.poll_task(&obj.value));
        }
        let object = w.object(obj).ok_or_else(|| missing_object(obj))?;
        Ok(object.props.get(path).cloned().unwrap_or(Value::Null))
    }

    async fn list_objects(
        &self,
        conn: &u64,
        type_name: &str,
        paths: &[&str],
    ) -> Result<Vec<ObjectContent>, Fault> {
        tokio::task::yield_now().await;
        let mut w = self.world();
        w.check(*conn, LIST)?;
        Ok(w.objects
            .iter()
            .filter(|o| o.moref.is_kind(type_name))
            .map(|o| {
                paths.iter().fold(ObjectContent::new(o.moref.clone()), |content, path| {
                    match o.props.get(*path) {
                        Some(value) => content.with_prop(*path, value.clone()),
                        None => content,
                    }
                })
            })
            .collect())
    }
}

// ── FakeImages ────────────────────────────────────────────────────────────────

/// [`ImageTransport`] writing into the fake endpoint's file tree.
pub struct FakeImages {
    endpoint: FakeEndpoint,
    known: Vec<String>,
}

impl FakeImages {
    pub fn new(endpoint: &FakeEndpoint, known: &[&str]) -> Self {
        Self {
            endpoint: endpoint.clone(),
            known: known.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ImageTransport for FakeImages {
    async fn fetch_image(&self, image_ref: &str, dest: &DatastoreFile) -> Result<(), VmopsError> {
        if !self.known.iter().any(|k| k == image_ref) {
            return Err(VmopsError::Transfer(format!("image {image_ref} not found")));
        }
        let mut w = self.endpoint.world();
        let path = dest.path.to_string();
        if !w.parent_exists(&path) {
            return Err(VmopsError::Transfer(format!("folder of {path} not found")));
        }
        w.files.insert(path.clone());
        w.transfers.push(format!("fetch {image_ref} -> {path}"));
        Ok(())
    }

    async fn upload_image(
        &self,
        image_name: &str,
        source: &DatastoreFile,
    ) -> Result<(), VmopsError> {
        let mut w = self.endpoint.world();
        let path = source.path.to_string();
        if !w.files.contains(&path) {
            return Err(VmopsError::Transfer(format!("{path} not found")));
        }
        w.transfers.push(format!("upload {path} -> {image_name}"));
        Ok(())
    }
}

// ── RecordingReporter ─────────────────────────────────────────────────────────

/// [`ProgressReporter`] that remembers every message.
#[derive(Default)]
pub struct RecordingReporter {
    pub steps: RefCell<Vec<String>>,
    pub successes: RefCell<Vec<String>>,
    pub warnings: RefCell<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.steps.borrow_mut().push(message.to_string());
    }

    fn success(&self, message: &str) {
        self.successes.borrow_mut().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}
