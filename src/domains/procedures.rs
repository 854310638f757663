pub const GET_PLANT_OVERVIEW: &str = "GetPlantOverview";
pub const GET_DEVICES: &str = "GetDevices";
pub const GET_PROCESS_DATA_CHANNELS: &str = "GetProcessDataChannels";
pub const GET_PROCESS_DATA: &str = "GetProcessData";
pub const GET_PARAMETER_CHANNELS: &str = "GetParameterChannels";
pub const GET_PARAMETER: &str = "GetParameter";
pub const SET_PARAMETER: &str = "SetParameter";

pub const ALL: [&str; 7] = [
    GET_PLANT_OVERVIEW,
    GET_DEVICES,
    GET_PROCESS_DATA_CHANNELS,
    GET_PROCESS_DATA,
    GET_PARAMETER_CHANNELS,
    GET_PARAMETER,
    SET_PARAMETER,
];

pub fn is_known(procedure: &str) -> bool {
    ALL.contains(&procedure)
}
